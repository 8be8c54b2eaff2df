//! Student command handlers

use crate::error::CommandError;
use crate::protocol::ServerMessage;
use crate::state::Session;
use crate::types::Participant;

pub fn handle_submit_answer(
    session: &mut Session,
    student: &Participant,
    option_id: &str,
) -> Result<(), CommandError> {
    let room_id = &student.room_id;
    let outcome = session.polls.submit_answer(
        &mut session.participants,
        &student.id,
        option_id,
        room_id,
    )?;

    session.broadcast_to_room(
        room_id,
        ServerMessage::AnswerSubmitted {
            room_id: room_id.clone(),
            results: outcome.results,
            participants: session.room_participants(room_id),
        },
    );

    if let Some(poll) = outcome.ended {
        session.finish_poll(&poll);
    }
    Ok(())
}
