//! WebSocket message dispatch
//!
//! This module provides the main entry point for handling client messages.
//! The caller is resolved and authorized here, then dispatched to the
//! role-specific handler modules. Everything runs under the session lock.

use crate::error::CommandError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, LeaveReason, Session};
use crate::types::{ConnectionId, Participant};
use std::sync::Arc;

use super::{room, student, teacher};

/// Resolve the caller as a teacher, or the error explaining why not
macro_rules! check_teacher {
    ($session:expr, $connection:expr) => {
        match $session.participants.by_connection($connection) {
            Some(p) if p.is_teacher() => Ok(p.clone()),
            Some(_) => Err(CommandError::NotATeacher),
            None => Err(CommandError::UnknownParticipant),
        }
    };
}

/// The participant speaking through `connection`, if it has joined a room
fn caller(session: &Session, connection: &str) -> Result<Participant, CommandError> {
    session
        .participants
        .by_connection(connection)
        .cloned()
        .ok_or(CommandError::UnknownParticipant)
}

/// Handle a client message and return the error event for the caller, if any.
/// Successful commands deliver their events through the connection hub.
pub async fn handle_message(
    connection: &ConnectionId,
    msg: ClientMessage,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    let mut session = state.session.lock().await;

    let result = match msg {
        ClientMessage::JoinRoom {
            display_name,
            role,
            room_id,
        } => room::handle_join(&mut session, connection, display_name, role, &room_id),

        ClientMessage::SendMessage {
            text,
            client_msg_id,
        } => caller(&session, connection).and_then(|sender| {
            room::handle_send_message(&mut session, &sender, &text, client_msg_id.as_deref())
        }),

        ClientMessage::GetPollHistory => caller(&session, connection)
            .map(|participant| room::handle_poll_history(&session, &participant)),

        ClientMessage::SubmitAnswer { option_id } => caller(&session, connection)
            .and_then(|participant| {
                student::handle_submit_answer(&mut session, &participant, &option_id)
            }),

        // Teacher-only commands (authorization checked before dispatch)
        ClientMessage::CreatePoll {
            question,
            options,
            duration,
        } => check_teacher!(session, connection).and_then(|requester| {
            teacher::handle_create_poll(state, &mut session, &requester, question, options, duration)
        }),

        ClientMessage::KickStudent { student_id } => check_teacher!(session, connection)
            .and_then(|requester| teacher::handle_kick(&mut session, &requester, &student_id)),
    };

    match result {
        Ok(()) => None,
        Err(e) => {
            tracing::warn!("Rejected command from {}: {}", connection, e);
            Some(e.into())
        }
    }
}

/// Clean up after a socket closed, whatever the reason
pub async fn handle_disconnect(connection: &ConnectionId, state: &Arc<AppState>) {
    let mut session = state.session.lock().await;
    if let Some(participant) = session.leave_room(connection, LeaveReason::Left) {
        tracing::info!(
            "{} disconnected from room '{}'",
            participant.display_name,
            participant.room_id
        );
    }
    session.hub.unregister(connection);
}
