use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types for type safety
pub type ConnectionId = String;
pub type ParticipantId = String;
pub type PollId = String;
pub type OptionId = String;
pub type MessageId = String;
/// Normalized room key (see `state::room::normalize_room_id`)
pub type RoomId = String;

/// Per-option vote counts
pub type Tally = HashMap<OptionId, u32>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub room_id: RoomId,
    /// Live connection this participant speaks through (never sent to clients)
    #[serde(skip)]
    pub connection: ConnectionId,
    pub has_answered: bool,
    pub chosen_option_id: Option<OptionId>,
}

impl Participant {
    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    pub fn is_student(&self) -> bool {
        self.role == Role::Student
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PollOption {
    pub id: OptionId,
    pub text: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    pub id: PollId,
    pub room_id: RoomId,
    pub question: String,
    pub options: Vec<PollOption>,
    pub duration_seconds: u64,
    pub created_at: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub results: Tally,
}

impl Poll {
    pub fn total_votes(&self) -> u32 {
        self.results.values().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender_id: String,
    pub sender_display_name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub sender_is_teacher: bool,
}

/// Sender id used for server-generated chat lines (join announcements)
pub const SYSTEM_SENDER_ID: &str = "system";
pub const SYSTEM_SENDER_NAME: &str = "System";
