pub mod chat;
pub mod participant;
pub mod poll;
pub mod room;

use crate::broadcast::ConnectionHub;
use crate::config::ServerConfig;
use crate::protocol::ServerMessage;
use crate::types::*;
use chat::ChatLog;
use participant::ParticipantDirectory;
use poll::PollEngine;
use room::RoomRegistry;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;

/// Shared application state
///
/// Every command and every poll timer runs with `session` locked, so state
/// changes and the events they trigger never interleave.
pub struct AppState {
    pub session: Mutex<Session>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            session: Mutex::new(Session::new(&config)),
            config,
        }
    }

    /// Allocate an id and outbound channel for a freshly opened socket
    pub async fn connect(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection = ulid::Ulid::new().to_string();
        let rx = self.session.lock().await.hub.register(&connection);
        (connection, rx)
    }

    pub async fn send_to(&self, connection: &str, msg: ServerMessage) -> bool {
        self.session.lock().await.send_to(connection, msg)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(ServerConfig::default())
    }
}

/// Why a participant is leaving their room
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Disconnect, or rejoining somewhere else
    Left,
    Kicked,
}

struct PollTimer {
    poll_id: PollId,
    /// Connection of the teacher who created the poll
    owner: ConnectionId,
    handle: AbortHandle,
}

/// Everything the coordinator owns
pub struct Session {
    pub rooms: RoomRegistry,
    pub participants: ParticipantDirectory,
    pub polls: PollEngine,
    pub chat: ChatLog,
    pub hub: ConnectionHub,
    timers: HashMap<RoomId, PollTimer>,
}

impl Session {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            rooms: RoomRegistry::new(),
            participants: ParticipantDirectory::new(),
            polls: PollEngine::new(config.max_poll_seconds),
            chat: ChatLog::new(config.chat_history_limit, config.dedup_window),
            hub: ConnectionHub::new(),
            timers: HashMap::new(),
        }
    }

    pub fn room_participants(&self, room_id: &str) -> Vec<Participant> {
        self.participants
            .list(Some(room_id), participant::RoleFilter::All)
    }

    pub fn send_to(&self, connection: &str, msg: ServerMessage) -> bool {
        self.hub.unicast(connection, msg)
    }

    pub fn broadcast_to_room(&self, room_id: &str, msg: ServerMessage) {
        let members = self.rooms.members(room_id);
        let delivered = self.hub.broadcast(&members, &msg);
        tracing::debug!(
            "Broadcast to room '{}' reached {}/{} connections",
            room_id,
            delivered,
            members.len()
        );
    }

    /// Broadcast to a room, skipping one connection
    pub fn broadcast_except(&self, room_id: &str, except: &str, msg: ServerMessage) {
        let members = self.rooms.members(room_id);
        self.hub
            .broadcast(members.iter().filter(|c| c.as_str() != except), &msg);
    }

    pub fn broadcast_participants(&self, room_id: &str, message: Option<String>) {
        self.broadcast_to_room(
            room_id,
            ServerMessage::ParticipantUpdate {
                room_id: room_id.to_string(),
                participants: self.room_participants(room_id),
                message,
            },
        );
    }

    /// Remember the deadline task for a room's poll, aborting whatever it replaces
    pub fn arm_timer(
        &mut self,
        room_id: &RoomId,
        poll_id: &PollId,
        owner: &ConnectionId,
        handle: AbortHandle,
    ) {
        let timer = PollTimer {
            poll_id: poll_id.clone(),
            owner: owner.clone(),
            handle,
        };
        if let Some(previous) = self.timers.insert(room_id.clone(), timer) {
            previous.handle.abort();
            tracing::debug!("Aborted timer for replaced poll {}", previous.poll_id);
        }
    }

    pub fn cancel_timer(&mut self, room_id: &str) -> bool {
        match self.timers.remove(room_id) {
            Some(timer) => {
                timer.handle.abort();
                tracing::debug!(
                    "Cancelled timer for poll {} created by {}",
                    timer.poll_id,
                    timer.owner
                );
                true
            }
            None => false,
        }
    }

    pub fn has_timer(&self, room_id: &str) -> bool {
        self.timers.contains_key(room_id)
    }

    /// Connection that created the room's pending poll timer
    pub fn timer_owner(&self, room_id: &str) -> Option<&str> {
        self.timers.get(room_id).map(|timer| timer.owner.as_str())
    }

    /// Tell the room a poll is over. The poll must already be out of the active slot.
    pub fn announce_poll_end(&self, poll: &Poll) {
        self.broadcast_to_room(
            &poll.room_id,
            ServerMessage::PollEnded {
                room_id: poll.room_id.clone(),
                poll_id: poll.id.clone(),
                results: poll.results.clone(),
                participants: self.room_participants(&poll.room_id),
            },
        );
    }

    /// Wrap up a poll that ended because everyone answered
    pub fn finish_poll(&mut self, poll: &Poll) {
        if self
            .timers
            .get(&poll.room_id)
            .is_some_and(|timer| timer.poll_id == poll.id)
        {
            self.cancel_timer(&poll.room_id);
        }
        self.announce_poll_end(poll);
    }

    /// Deadline path: end `poll_id` if it is still the room's active poll
    pub fn expire_poll(&mut self, room_id: &str, poll_id: &str) -> bool {
        if self
            .timers
            .get(room_id)
            .is_some_and(|timer| timer.poll_id == poll_id)
        {
            // This task is the timer, nothing to abort
            self.timers.remove(room_id);
        }
        match self.polls.end_if_current(room_id, poll_id) {
            Some(poll) => {
                self.announce_poll_end(&poll);
                true
            }
            None => false,
        }
    }

    /// Archive the room's active poll without telling anyone
    fn shelve_poll(&mut self, room_id: &str) {
        self.cancel_timer(room_id);
        if let Some(poll) = self.polls.end(room_id) {
            tracing::info!(
                "Archived poll {} in room '{}', no teacher left",
                poll.id,
                room_id
            );
        }
    }

    /// Take a connection's participant out of its room and tell whoever is left.
    ///
    /// The sole teacher leaving archives the room's poll and sends `teacherLeft`;
    /// anyone else leaving sends the shrunken participant list. A room that
    /// empties out has its poll archived and nobody to notify.
    pub fn leave_room(&mut self, connection: &str, reason: LeaveReason) -> Option<Participant> {
        let participant = self.participants.by_connection(connection).cloned()?;
        self.participants.remove(&participant.id);
        self.rooms.leave(&participant.connection);
        self.chat.forget_sender(&participant.id);

        let room_id = participant.room_id.clone();
        tracing::info!(
            "{} ({:?}) left room '{}' ({:?})",
            participant.display_name,
            participant.role,
            room_id,
            reason
        );

        if !self.rooms.contains_room(&room_id) {
            self.shelve_poll(&room_id);
            return Some(participant);
        }

        if participant.is_teacher() && self.participants.teachers(&room_id).is_empty() {
            self.shelve_poll(&room_id);
            self.broadcast_to_room(
                &room_id,
                ServerMessage::TeacherLeft {
                    room_id: room_id.clone(),
                },
            );
        } else {
            let note = match reason {
                LeaveReason::Left => format!("{} left the session", participant.display_name),
                LeaveReason::Kicked => {
                    format!("{} was removed by the teacher", participant.display_name)
                }
            };
            self.broadcast_participants(&room_id, Some(note));
        }

        Some(participant)
    }
}
