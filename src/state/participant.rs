use crate::types::*;
use std::collections::HashMap;

/// Which roles a directory query should return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFilter {
    All,
    Only(Role),
}

impl RoleFilter {
    fn matches(self, role: Role) -> bool {
        match self {
            RoleFilter::All => true,
            RoleFilter::Only(r) => r == role,
        }
    }
}

/// Participant records, indexed by id and by the connection they speak through
#[derive(Debug, Default)]
pub struct ParticipantDirectory {
    by_id: HashMap<ParticipantId, Participant>,
    by_connection: HashMap<ConnectionId, ParticipantId>,
}

impl ParticipantDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh participant for a connection joining `room_id`
    pub fn create(
        &mut self,
        connection: &ConnectionId,
        display_name: String,
        role: Role,
        room_id: &RoomId,
    ) -> Participant {
        let participant = Participant {
            id: ulid::Ulid::new().to_string(),
            display_name,
            role,
            room_id: room_id.clone(),
            connection: connection.clone(),
            has_answered: false,
            chosen_option_id: None,
        };
        self.add(participant.clone());
        participant
    }

    /// Insert a participant, replacing whatever the same connection had before
    pub fn add(&mut self, participant: Participant) {
        if let Some(old_id) = self
            .by_connection
            .insert(participant.connection.clone(), participant.id.clone())
        {
            if old_id != participant.id {
                self.by_id.remove(&old_id);
            }
        }
        self.by_id.insert(participant.id.clone(), participant);
    }

    pub fn remove(&mut self, participant_id: &str) -> Option<Participant> {
        let participant = self.by_id.remove(participant_id)?;
        if self.by_connection.get(&participant.connection) == Some(&participant.id) {
            self.by_connection.remove(&participant.connection);
        }
        Some(participant)
    }

    pub fn get(&self, participant_id: &str) -> Option<&Participant> {
        self.by_id.get(participant_id)
    }

    pub fn get_mut(&mut self, participant_id: &str) -> Option<&mut Participant> {
        self.by_id.get_mut(participant_id)
    }

    pub fn by_connection(&self, connection: &str) -> Option<&Participant> {
        let id = self.by_connection.get(connection)?;
        self.by_id.get(id)
    }

    pub fn by_connection_mut(&mut self, connection: &str) -> Option<&mut Participant> {
        let id = self.by_connection.get(connection)?;
        self.by_id.get_mut(id)
    }

    /// Participants, optionally limited to one room, filtered by role.
    /// Sorted by id so repeated snapshots list people in the same order.
    pub fn list(&self, room_id: Option<&str>, filter: RoleFilter) -> Vec<Participant> {
        let mut participants: Vec<Participant> = self
            .by_id
            .values()
            .filter(|p| room_id.is_none_or(|room| p.room_id == room))
            .filter(|p| filter.matches(p.role))
            .cloned()
            .collect();
        participants.sort_by(|a, b| a.id.cmp(&b.id));
        participants
    }

    pub fn students(&self, room_id: &str) -> Vec<Participant> {
        self.list(Some(room_id), RoleFilter::Only(Role::Student))
    }

    pub fn teachers(&self, room_id: &str) -> Vec<Participant> {
        self.list(Some(room_id), RoleFilter::Only(Role::Teacher))
    }

    /// Mutable access to every student currently in `room_id`
    pub fn students_mut<'a>(
        &'a mut self,
        room_id: &'a str,
    ) -> impl Iterator<Item = &'a mut Participant> + 'a {
        self.by_id
            .values_mut()
            .filter(move |p| p.room_id == room_id && p.is_student())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
