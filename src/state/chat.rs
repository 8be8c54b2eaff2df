use crate::error::CommandError;
use crate::types::*;
use std::collections::{HashMap, VecDeque};

/// Who is speaking, resolved by the caller from the participant record
#[derive(Debug, Clone)]
pub struct ChatSender {
    pub id: String,
    pub display_name: String,
    pub is_teacher: bool,
}

impl ChatSender {
    pub fn system() -> Self {
        Self {
            id: SYSTEM_SENDER_ID.to_string(),
            display_name: SYSTEM_SENDER_NAME.to_string(),
            is_teacher: false,
        }
    }
}

impl From<&Participant> for ChatSender {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id.clone(),
            display_name: participant.display_name.clone(),
            is_teacher: participant.is_teacher(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatAppend {
    Recorded(ChatMessage),
    /// Same sender resent a client message id we already stored
    Duplicate,
}

/// Per-room bounded chat history
///
/// Each room keeps at most `limit` messages, but a room's log outlives the
/// room itself, so the map holds one entry per room name ever used.
#[derive(Debug)]
pub struct ChatLog {
    rooms: HashMap<RoomId, VecDeque<ChatMessage>>,
    /// Recent client message ids per sender, oldest first
    seen: HashMap<String, VecDeque<String>>,
    limit: usize,
    dedup_window: usize,
}

impl ChatLog {
    pub fn new(limit: usize, dedup_window: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            seen: HashMap::new(),
            limit: limit.max(1),
            dedup_window,
        }
    }

    /// Append a message to the room log, evicting the oldest entries past the cap
    pub fn append(
        &mut self,
        room_id: &RoomId,
        sender: ChatSender,
        text: &str,
        client_msg_id: Option<&str>,
    ) -> Result<ChatAppend, CommandError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CommandError::InvalidPayload(
                "Message must not be empty".to_string(),
            ));
        }

        if let Some(client_id) = client_msg_id {
            if self.is_duplicate(&sender.id, client_id) {
                tracing::debug!(
                    "Dropping duplicate chat message {} from {}",
                    client_id,
                    sender.id
                );
                return Ok(ChatAppend::Duplicate);
            }
        }

        let message = ChatMessage {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.clone(),
            sender_id: sender.id,
            sender_display_name: sender.display_name,
            text: text.to_string(),
            timestamp: chrono::Utc::now(),
            sender_is_teacher: sender.is_teacher,
        };

        let log = self.rooms.entry(room_id.clone()).or_default();
        log.push_back(message.clone());
        while log.len() > self.limit {
            log.pop_front();
        }

        Ok(ChatAppend::Recorded(message))
    }

    /// Records `client_id` for the sender and reports whether it was already there
    fn is_duplicate(&mut self, sender_id: &str, client_id: &str) -> bool {
        if self.dedup_window == 0 {
            return false;
        }
        let recent = self.seen.entry(sender_id.to_string()).or_default();
        if recent.iter().any(|id| id == client_id) {
            return true;
        }
        recent.push_back(client_id.to_string());
        while recent.len() > self.dedup_window {
            recent.pop_front();
        }
        false
    }

    /// Room log, oldest first
    pub fn history(&self, room_id: &str) -> Vec<ChatMessage> {
        self.rooms
            .get(room_id)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drop dedup memory for a sender that is gone for good
    pub fn forget_sender(&mut self, sender_id: &str) {
        self.seen.remove(sender_id);
    }
}
