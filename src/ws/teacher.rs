//! Teacher-only command handlers
//!
//! Authorization is checked in the main dispatch layer before calling these.

use crate::broadcast::spawn_poll_timer;
use crate::error::CommandError;
use crate::protocol::{PollOptionInput, ServerMessage};
use crate::state::poll::PollDraft;
use crate::state::{AppState, LeaveReason, Session};
use crate::types::Participant;
use std::sync::Arc;
use std::time::Duration;

pub fn handle_create_poll(
    state: &Arc<AppState>,
    session: &mut Session,
    teacher: &Participant,
    question: String,
    options: Vec<PollOptionInput>,
    duration_seconds: u64,
) -> Result<(), CommandError> {
    let room_id = &teacher.room_id;
    let draft = PollDraft {
        question,
        options,
        duration_seconds,
    };
    let poll = session
        .polls
        .create(room_id, draft, &mut session.participants)?;

    let timer = spawn_poll_timer(
        state.clone(),
        room_id.clone(),
        poll.id.clone(),
        Duration::from_secs(poll.duration_seconds),
    );
    session.arm_timer(room_id, &poll.id, &teacher.connection, timer);

    let participants = session.room_participants(room_id);
    session.broadcast_to_room(
        room_id,
        ServerMessage::NewPoll {
            room_id: room_id.clone(),
            poll,
            participants,
        },
    );
    Ok(())
}

/// Remove a student from the teacher's room and close their connection
pub fn handle_kick(
    session: &mut Session,
    teacher: &Participant,
    student_id: &str,
) -> Result<(), CommandError> {
    let target = session
        .participants
        .get(student_id)
        .filter(|p| p.is_student() && p.room_id == teacher.room_id)
        .cloned()
        .ok_or(CommandError::TargetNotStudent)?;

    tracing::info!(
        "{} kicked {} from room '{}'",
        teacher.display_name,
        target.display_name,
        target.room_id
    );

    session.send_to(
        &target.connection,
        ServerMessage::Kicked {
            room_id: target.room_id.clone(),
        },
    );
    session.leave_room(&target.connection, LeaveReason::Kicked);
    // Queued `kicked` still drains before the writer sees the channel close
    session.hub.unregister(&target.connection);
    Ok(())
}
