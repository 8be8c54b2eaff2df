//! Commands open to anyone: joining, chat, poll history

use crate::error::CommandError;
use crate::protocol::ServerMessage;
use crate::state::chat::{ChatAppend, ChatSender};
use crate::state::room::normalize_room_id;
use crate::state::{LeaveReason, Session};
use crate::types::{ConnectionId, Participant, Role};

/// Seat a connection in a room.
///
/// Joining the room the connection is already in keeps its participant (and
/// any answer it gave), refreshes name and role, and re-sends the snapshot.
/// A connection coming from another room is torn down there first and gets a
/// new participant id. The joiner receives the full room snapshot before
/// anyone else hears about them.
pub fn handle_join(
    session: &mut Session,
    connection: &ConnectionId,
    display_name: String,
    role: Role,
    raw_room_id: &str,
) -> Result<(), CommandError> {
    let display_name = display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(CommandError::InvalidPayload(
            "Display name must not be empty".to_string(),
        ));
    }
    let room_id = normalize_room_id(raw_room_id);

    if session.rooms.room_of(connection) == Some(&room_id) {
        if let Some(existing) = session.participants.by_connection_mut(connection) {
            let changed = existing.display_name != display_name || existing.role != role;
            existing.display_name = display_name;
            existing.role = role;
            let participant = existing.clone();
            tracing::debug!(
                "{} re-sent join for room '{}', keeping {}",
                participant.display_name,
                room_id,
                participant.id
            );

            send_snapshot(session, &participant);
            if changed {
                session.broadcast_except(
                    &room_id,
                    connection,
                    ServerMessage::ParticipantUpdate {
                        room_id: room_id.clone(),
                        participants: session.room_participants(&room_id),
                        message: None,
                    },
                );
            }
            return Ok(());
        }
    }

    if let Some(previous) = session.leave_room(connection, LeaveReason::Left) {
        tracing::info!(
            "{} is rejoining, left room '{}' first",
            previous.display_name,
            previous.room_id
        );
    }

    session.rooms.join(connection, &room_id);
    let participant = session
        .participants
        .create(connection, display_name, role, &room_id);
    tracing::info!(
        "{} joined room '{}' as {:?} ({})",
        participant.display_name,
        room_id,
        role,
        participant.id
    );

    send_snapshot(session, &participant);
    session.broadcast_except(
        &room_id,
        connection,
        ServerMessage::ParticipantUpdate {
            room_id: room_id.clone(),
            participants: session.room_participants(&room_id),
            message: Some(format!("{} joined", participant.display_name)),
        },
    );

    let announcement = format!("{} has joined the session", participant.display_name);
    if let ChatAppend::Recorded(message) =
        session
            .chat
            .append(&room_id, ChatSender::system(), &announcement, None)?
    {
        session.broadcast_to_room(&room_id, ServerMessage::ChatMessage { message });
    }

    Ok(())
}

/// Unicast the full room state to a participant's connection
fn send_snapshot(session: &Session, participant: &Participant) {
    let room_id = &participant.room_id;
    let participants = session.room_participants(room_id);
    session.send_to(
        &participant.connection,
        ServerMessage::UserJoined {
            participant_id: participant.id.clone(),
            room_id: room_id.clone(),
            is_teacher: participant.is_teacher(),
            total_participants: participants.len(),
            participants,
            active_poll: session.polls.active(room_id).cloned(),
            chat_messages: session.chat.history(room_id),
        },
    );
}

pub fn handle_send_message(
    session: &mut Session,
    sender: &Participant,
    text: &str,
    client_msg_id: Option<&str>,
) -> Result<(), CommandError> {
    match session
        .chat
        .append(&sender.room_id, ChatSender::from(sender), text, client_msg_id)?
    {
        ChatAppend::Recorded(message) => {
            tracing::debug!("Chat in '{}' from {}", sender.room_id, sender.display_name);
            session.broadcast_to_room(&sender.room_id, ServerMessage::ChatMessage { message });
        }
        ChatAppend::Duplicate => {}
    }
    Ok(())
}

pub fn handle_poll_history(session: &Session, participant: &Participant) {
    session.send_to(
        &participant.connection,
        ServerMessage::PollHistory {
            room_id: participant.room_id.clone(),
            history: session.polls.history(&participant.room_id).to_vec(),
        },
    );
}
