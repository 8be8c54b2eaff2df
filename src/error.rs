//! Recoverable command failures.
//!
//! Every variant is reported to the originating connection only, as an
//! `error` event carrying [`CommandError::code`] and the display text.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("Only teachers can do that")]
    NotATeacher,
    #[error("Only students can answer polls")]
    NotAStudent,
    #[error("Cannot create poll while students are still answering")]
    PollInProgress,
    #[error("No active poll in this room")]
    NoActivePoll,
    #[error("You already answered this poll")]
    AlreadyAnswered,
    #[error("Unknown option: {0}")]
    UnknownOption(String),
    #[error("Target is not a student in your room")]
    TargetNotStudent,
    #[error("You have not joined a room")]
    UnknownParticipant,
    #[error("{0}")]
    InvalidPayload(String),
}

impl CommandError {
    /// Stable machine-readable code for the `error` event
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotATeacher => "NOT_A_TEACHER",
            Self::NotAStudent => "NOT_A_STUDENT",
            Self::PollInProgress => "POLL_IN_PROGRESS",
            Self::NoActivePoll => "NO_ACTIVE_POLL",
            Self::AlreadyAnswered => "ALREADY_ANSWERED",
            Self::UnknownOption(_) => "UNKNOWN_OPTION",
            Self::TargetNotStudent => "TARGET_NOT_STUDENT",
            Self::UnknownParticipant => "UNKNOWN_PARTICIPANT",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
        }
    }
}
