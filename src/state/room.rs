//! Room membership registry
//!
//! Tracks which connections are in which room. A connection is in at most one
//! room; a room with no members is removed on the spot.

use crate::types::{ConnectionId, RoomId};
use std::collections::{HashMap, HashSet};

/// Room used when a client joins without naming one
pub const DEFAULT_ROOM: &str = "default-room";

/// Lower-case and trim a client-supplied room name so `"Room A"` and `"room a "` collide
pub fn normalize_room_id(raw: &str) -> RoomId {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_ROOM.to_string()
    } else {
        trimmed.to_lowercase()
    }
}

/// Outcome of removing a connection from its room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: RoomId,
    pub room_now_empty: bool,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    members: HashMap<RoomId, HashSet<ConnectionId>>,
    room_of: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `connection` into `room_id`, leaving its previous room first.
    /// Returns the previous room's departure, if the connection was somewhere else.
    pub fn join(&mut self, connection: &ConnectionId, room_id: &RoomId) -> Option<Departure> {
        let previous = match self.room_of.get(connection) {
            Some(current) if current == room_id => None,
            Some(_) => self.leave(connection),
            None => None,
        };

        self.members
            .entry(room_id.clone())
            .or_default()
            .insert(connection.clone());
        self.room_of.insert(connection.clone(), room_id.clone());

        previous
    }

    /// Remove `connection` from whatever room it is in
    pub fn leave(&mut self, connection: &ConnectionId) -> Option<Departure> {
        let room_id = self.room_of.remove(connection)?;

        let room_now_empty = match self.members.get_mut(&room_id) {
            Some(set) => {
                set.remove(connection);
                set.is_empty()
            }
            None => true,
        };

        if room_now_empty {
            self.members.remove(&room_id);
            tracing::debug!("Room '{}' is empty, removed", room_id);
        }

        Some(Departure {
            room_id,
            room_now_empty,
        })
    }

    pub fn room_of(&self, connection: &ConnectionId) -> Option<&RoomId> {
        self.room_of.get(connection)
    }

    /// Snapshot of a room's connections (empty for unknown rooms)
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.members
            .get(room_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.members.contains_key(room_id)
    }

    pub fn room_count(&self) -> usize {
        self.members.len()
    }
}
