use crate::error::CommandError;
use crate::types::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    JoinRoom {
        #[serde(alias = "userName")]
        display_name: String,
        #[serde(alias = "userType")]
        role: Role,
        #[serde(default)]
        room_id: String,
    },
    // Teacher-only messages
    CreatePoll {
        question: String,
        options: Vec<PollOptionInput>,
        duration: u64,
    },
    KickStudent {
        student_id: ParticipantId,
    },
    // Student messages
    SubmitAnswer {
        option_id: OptionId,
    },
    // Everyone
    SendMessage {
        text: String,
        /// Client-chosen id used to drop resent duplicates
        #[serde(default)]
        client_msg_id: Option<String>,
    },
    GetPollHistory,
}

/// Option as submitted by the teacher; ids are optional and filled in server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollOptionInput {
    #[serde(default)]
    pub id: Option<OptionId>,
    pub text: String,
    #[serde(default)]
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Snapshot sent to a connection right after it joins a room
    UserJoined {
        participant_id: ParticipantId,
        room_id: RoomId,
        is_teacher: bool,
        participants: Vec<Participant>,
        active_poll: Option<Poll>,
        chat_messages: Vec<ChatMessage>,
        total_participants: usize,
    },
    ParticipantUpdate {
        room_id: RoomId,
        participants: Vec<Participant>,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    NewPoll {
        room_id: RoomId,
        poll: Poll,
        participants: Vec<Participant>,
    },
    AnswerSubmitted {
        room_id: RoomId,
        results: Tally,
        participants: Vec<Participant>,
    },
    PollEnded {
        room_id: RoomId,
        poll_id: PollId,
        results: Tally,
        participants: Vec<Participant>,
    },
    ChatMessage {
        message: ChatMessage,
    },
    PollHistory {
        room_id: RoomId,
        history: Vec<Poll>,
    },
    /// Sent to a student removed by the teacher; the connection is closed afterwards
    Kicked {
        room_id: RoomId,
    },
    TeacherLeft {
        room_id: RoomId,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl From<CommandError> for ServerMessage {
    fn from(err: CommandError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}
