//! Poll lifecycle engine
//!
//! Each room has at most one active poll. A poll moves from the active slot to
//! the room's history exactly once, whichever comes first: its timer firing or
//! the last present student answering. The active slot is the only source of
//! truth for "is this poll still running", so a second end trigger finds
//! nothing to do.

use super::participant::ParticipantDirectory;
use crate::config::MAX_POLL_SECONDS_CEILING;
use crate::error::CommandError;
use crate::protocol::PollOptionInput;
use crate::types::*;
use std::collections::{HashMap, HashSet};

/// Teacher input for a new poll, before validation
#[derive(Debug, Clone)]
pub struct PollDraft {
    pub question: String,
    pub options: Vec<PollOptionInput>,
    pub duration_seconds: u64,
}

/// Result of a counted answer
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    pub poll_id: PollId,
    pub results: Tally,
    /// The archived poll, when this answer was the last one outstanding
    pub ended: Option<Poll>,
}

/// Active polls and archived history, keyed by room.
///
/// History is kept for every room name ever used and is not dropped when a
/// room empties, so it grows by one entry per distinct room plus one poll
/// per poll run.
#[derive(Debug)]
pub struct PollEngine {
    active: HashMap<RoomId, Poll>,
    history: HashMap<RoomId, Vec<Poll>>,
    max_duration_seconds: u64,
}

impl PollEngine {
    pub fn new(max_duration_seconds: u64) -> Self {
        Self {
            active: HashMap::new(),
            history: HashMap::new(),
            max_duration_seconds: max_duration_seconds.min(MAX_POLL_SECONDS_CEILING),
        }
    }

    /// True when the room has no active poll, or every student present has answered it
    pub fn can_create(&self, room_id: &str, directory: &ParticipantDirectory) -> bool {
        if !self.active.contains_key(room_id) {
            return true;
        }
        directory
            .students(room_id)
            .iter()
            .all(|student| student.has_answered)
    }

    /// Open a new poll in `room_id`.
    ///
    /// Any poll still sitting in the active slot (possible only when nobody is
    /// left to answer it) is archived first. Every student in the room starts
    /// the new poll unanswered.
    pub fn create(
        &mut self,
        room_id: &RoomId,
        draft: PollDraft,
        directory: &mut ParticipantDirectory,
    ) -> Result<Poll, CommandError> {
        let (question, options) = self.validate(draft.question, draft.options, draft.duration_seconds)?;

        if !self.can_create(room_id, directory) {
            return Err(CommandError::PollInProgress);
        }

        if let Some(previous) = self.end(room_id) {
            tracing::info!(
                "Archived poll {} in room '{}' to make way for a new one",
                previous.id,
                room_id
            );
        }

        let created_at = chrono::Utc::now();
        let end_time = created_at + chrono::Duration::seconds(draft.duration_seconds as i64);
        let results = options.iter().map(|o| (o.id.clone(), 0)).collect();

        let poll = Poll {
            id: ulid::Ulid::new().to_string(),
            room_id: room_id.clone(),
            question,
            options,
            duration_seconds: draft.duration_seconds,
            created_at,
            end_time,
            is_active: true,
            results,
        };

        for student in directory.students_mut(room_id) {
            student.has_answered = false;
            student.chosen_option_id = None;
        }

        self.active.insert(room_id.clone(), poll.clone());
        tracing::info!(
            "Created poll {} in room '{}': {} ({}s)",
            poll.id,
            room_id,
            poll.question,
            poll.duration_seconds
        );
        Ok(poll)
    }

    fn validate(
        &self,
        question: String,
        inputs: Vec<PollOptionInput>,
        duration_seconds: u64,
    ) -> Result<(String, Vec<PollOption>), CommandError> {
        let question = question.trim().to_string();
        if question.is_empty() {
            return Err(CommandError::InvalidPayload(
                "Question must not be empty".to_string(),
            ));
        }
        if inputs.len() < 2 {
            return Err(CommandError::InvalidPayload(
                "A poll needs at least two options".to_string(),
            ));
        }
        if duration_seconds == 0 {
            return Err(CommandError::InvalidPayload(
                "Duration must be greater than zero".to_string(),
            ));
        }
        if duration_seconds > self.max_duration_seconds {
            return Err(CommandError::InvalidPayload(format!(
                "Duration must be at most {} seconds",
                self.max_duration_seconds
            )));
        }

        let mut seen = HashSet::new();
        let mut options = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.into_iter().enumerate() {
            let text = input.text.trim().to_string();
            if text.is_empty() {
                return Err(CommandError::InvalidPayload(
                    "Option text must not be empty".to_string(),
                ));
            }
            let id = input
                .id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("opt-{}", index + 1));
            if !seen.insert(id.clone()) {
                return Err(CommandError::InvalidPayload(format!(
                    "Duplicate option id: {}",
                    id
                )));
            }
            options.push(PollOption {
                id,
                text,
                is_correct: input.is_correct,
            });
        }

        Ok((question, options))
    }

    /// Count one answer from a student.
    ///
    /// After a counted answer, the poll ends on the spot if every student
    /// currently in the room has answered.
    pub fn submit_answer(
        &mut self,
        directory: &mut ParticipantDirectory,
        participant_id: &str,
        option_id: &str,
        room_id: &str,
    ) -> Result<AnswerOutcome, CommandError> {
        let participant = directory
            .get(participant_id)
            .filter(|p| p.room_id == room_id)
            .ok_or(CommandError::UnknownParticipant)?;
        if !participant.is_student() {
            return Err(CommandError::NotAStudent);
        }
        let already_answered = participant.has_answered;

        let poll = self
            .active
            .get_mut(room_id)
            .ok_or(CommandError::NoActivePoll)?;
        if already_answered {
            return Err(CommandError::AlreadyAnswered);
        }
        let count = poll
            .results
            .get_mut(option_id)
            .ok_or_else(|| CommandError::UnknownOption(option_id.to_string()))?;
        *count += 1;

        let poll_id = poll.id.clone();
        let results = poll.results.clone();

        if let Some(participant) = directory.get_mut(participant_id) {
            participant.has_answered = true;
            participant.chosen_option_id = Some(option_id.to_string());
        }

        tracing::debug!(
            "Participant {} answered {} on poll {}",
            participant_id,
            option_id,
            poll_id
        );

        let everyone_answered = directory
            .students(room_id)
            .iter()
            .all(|student| student.has_answered);
        let ended = if everyone_answered {
            tracing::info!("All students answered poll {}, ending early", poll_id);
            self.end_if_current(room_id, &poll_id)
        } else {
            None
        };

        Ok(AnswerOutcome {
            poll_id,
            results,
            ended,
        })
    }

    /// Move the room's active poll into history. No-op when nothing is active.
    pub fn end(&mut self, room_id: &str) -> Option<Poll> {
        let mut poll = self.active.remove(room_id)?;
        poll.is_active = false;
        self.history
            .entry(poll.room_id.clone())
            .or_default()
            .push(poll.clone());
        tracing::info!(
            "Ended poll {} in room '{}' ({} votes)",
            poll.id,
            room_id,
            poll.total_votes()
        );
        Some(poll)
    }

    /// End the room's poll only if `poll_id` is still the active one.
    /// Stale triggers (a timer for an already replaced or ended poll) do nothing.
    pub fn end_if_current(&mut self, room_id: &str, poll_id: &str) -> Option<Poll> {
        match self.active.get(room_id) {
            Some(poll) if poll.id == poll_id => self.end(room_id),
            _ => None,
        }
    }

    pub fn results(&self, room_id: &str) -> Option<Tally> {
        self.active.get(room_id).map(|poll| poll.results.clone())
    }

    pub fn active(&self, room_id: &str) -> Option<&Poll> {
        self.active.get(room_id)
    }

    /// Archived polls for a room, oldest first
    pub fn history(&self, room_id: &str) -> &[Poll] {
        self.history.get(room_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOM: &str = "science";

    fn room() -> RoomId {
        ROOM.to_string()
    }

    fn option(id: &str, text: &str, is_correct: bool) -> PollOptionInput {
        PollOptionInput {
            id: Some(id.to_string()),
            text: text.to_string(),
            is_correct,
        }
    }

    fn red_planet() -> PollDraft {
        PollDraft {
            question: "Red planet?".to_string(),
            options: vec![option("mars", "Mars", true), option("venus", "Venus", false)],
            duration_seconds: 30,
        }
    }

    /// Teacher T plus students A and B in the science room
    fn classroom() -> (ParticipantDirectory, ParticipantId, ParticipantId, ParticipantId) {
        let mut directory = ParticipantDirectory::new();
        let t = directory.create(&"c-t".to_string(), "T".to_string(), Role::Teacher, &room());
        let a = directory.create(&"c-a".to_string(), "A".to_string(), Role::Student, &room());
        let b = directory.create(&"c-b".to_string(), "B".to_string(), Role::Student, &room());
        (directory, t.id, a.id, b.id)
    }

    #[test]
    fn test_create_initializes_poll() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(600);

        let poll = engine.create(&room(), red_planet(), &mut directory).unwrap();

        assert!(poll.is_active);
        assert_eq!(poll.room_id, ROOM);
        assert_eq!(poll.results.len(), 2);
        assert_eq!(poll.results["mars"], 0);
        assert_eq!(poll.results["venus"], 0);
        assert_eq!((poll.end_time - poll.created_at).num_seconds(), 30);
        assert_eq!(engine.active(ROOM).unwrap().id, poll.id);
    }

    #[test]
    fn test_create_fills_missing_option_ids() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(600);
        let draft = PollDraft {
            question: "  Pick one  ".to_string(),
            options: vec![
                PollOptionInput {
                    id: None,
                    text: "Yes".to_string(),
                    is_correct: false,
                },
                PollOptionInput {
                    id: Some("  ".to_string()),
                    text: "No".to_string(),
                    is_correct: false,
                },
            ],
            duration_seconds: 10,
        };

        let poll = engine.create(&room(), draft, &mut directory).unwrap();

        assert_eq!(poll.question, "Pick one");
        assert_eq!(poll.options[0].id, "opt-1");
        assert_eq!(poll.options[1].id, "opt-2");
    }

    #[test]
    fn test_create_rejects_invalid_drafts() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(60);

        let mut blank = red_planet();
        blank.question = "   ".to_string();
        let mut single = red_planet();
        single.options.truncate(1);
        let mut duplicate = red_planet();
        duplicate.options[1].id = Some("mars".to_string());
        let mut zero = red_planet();
        zero.duration_seconds = 0;
        let mut too_long = red_planet();
        too_long.duration_seconds = 61;

        for draft in [blank, single, duplicate, zero, too_long] {
            let result = engine.create(&room(), draft, &mut directory);
            assert!(matches!(result, Err(CommandError::InvalidPayload(_))));
        }
        assert!(engine.active(ROOM).is_none());
    }

    #[test]
    fn test_duration_limit_is_capped() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(u64::MAX);

        let mut huge = red_planet();
        huge.duration_seconds = u64::MAX;
        let result = engine.create(&room(), huge, &mut directory);
        assert!(matches!(result, Err(CommandError::InvalidPayload(_))));

        let mut day = red_planet();
        day.duration_seconds = MAX_POLL_SECONDS_CEILING;
        let poll = engine.create(&room(), day, &mut directory).unwrap();
        assert_eq!(
            poll.end_time - poll.created_at,
            chrono::Duration::seconds(MAX_POLL_SECONDS_CEILING as i64)
        );
    }

    #[test]
    fn test_create_resets_students() {
        let (mut directory, _, a, _) = classroom();
        let mut engine = PollEngine::new(600);
        {
            let student = directory.get_mut(&a).unwrap();
            student.has_answered = true;
            student.chosen_option_id = Some("old".to_string());
        }

        engine.create(&room(), red_planet(), &mut directory).unwrap();

        let student = directory.get(&a).unwrap();
        assert!(!student.has_answered);
        assert!(student.chosen_option_id.is_none());
    }

    #[test]
    fn test_cannot_create_while_students_are_answering() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(600);
        engine.create(&room(), red_planet(), &mut directory).unwrap();

        assert!(!engine.can_create(ROOM, &directory));
        let result = engine.create(&room(), red_planet(), &mut directory);
        assert_eq!(result.unwrap_err(), CommandError::PollInProgress);
        assert_eq!(engine.active_count(), 1);
    }

    #[test]
    fn test_can_create_without_students() {
        let mut directory = ParticipantDirectory::new();
        directory.create(&"c-t".to_string(), "T".to_string(), Role::Teacher, &room());
        let mut engine = PollEngine::new(600);

        assert!(engine.can_create(ROOM, &directory));
        let first = engine.create(&room(), red_planet(), &mut directory).unwrap();
        assert!(engine.can_create(ROOM, &directory));

        // The still-active first poll is archived when the second one opens
        let second = engine.create(&room(), red_planet(), &mut directory).unwrap();
        assert_eq!(engine.active(ROOM).unwrap().id, second.id);
        assert_eq!(engine.history(ROOM).len(), 1);
        assert_eq!(engine.history(ROOM)[0].id, first.id);
        assert!(!engine.history(ROOM)[0].is_active);
    }

    #[test]
    fn test_red_planet_scenario() {
        let (mut directory, _, a, b) = classroom();
        let mut engine = PollEngine::new(600);
        let poll = engine.create(&room(), red_planet(), &mut directory).unwrap();

        let first = engine
            .submit_answer(&mut directory, &a, "mars", ROOM)
            .unwrap();
        assert_eq!(first.results["mars"], 1);
        assert_eq!(first.results["venus"], 0);
        assert!(first.ended.is_none());
        assert!(engine.active(ROOM).is_some());

        let second = engine
            .submit_answer(&mut directory, &b, "venus", ROOM)
            .unwrap();
        assert_eq!(second.results["mars"], 1);
        assert_eq!(second.results["venus"], 1);

        let ended = second.ended.expect("last answer should end the poll");
        assert_eq!(ended.id, poll.id);
        assert!(!ended.is_active);
        assert!(engine.active(ROOM).is_none());
        assert_eq!(engine.history(ROOM).len(), 1);
        assert!(engine.can_create(ROOM, &directory));
    }

    #[test]
    fn test_second_answer_is_rejected_and_not_counted() {
        let (mut directory, _, a, _) = classroom();
        let mut engine = PollEngine::new(600);
        engine.create(&room(), red_planet(), &mut directory).unwrap();

        engine
            .submit_answer(&mut directory, &a, "mars", ROOM)
            .unwrap();
        let again = engine.submit_answer(&mut directory, &a, "venus", ROOM);

        assert_eq!(again.unwrap_err(), CommandError::AlreadyAnswered);
        let results = engine.results(ROOM).unwrap();
        assert_eq!(results["mars"], 1);
        assert_eq!(results["venus"], 0);
        assert_eq!(
            directory.get(&a).unwrap().chosen_option_id.as_deref(),
            Some("mars")
        );
    }

    #[test]
    fn test_submit_answer_errors() {
        let (mut directory, t, a, _) = classroom();
        let mut engine = PollEngine::new(600);

        let no_poll = engine.submit_answer(&mut directory, &a, "mars", ROOM);
        assert_eq!(no_poll.unwrap_err(), CommandError::NoActivePoll);

        engine.create(&room(), red_planet(), &mut directory).unwrap();

        let unknown_option = engine.submit_answer(&mut directory, &a, "pluto", ROOM);
        assert_eq!(
            unknown_option.unwrap_err(),
            CommandError::UnknownOption("pluto".to_string())
        );
        assert!(!directory.get(&a).unwrap().has_answered);

        let teacher = engine.submit_answer(&mut directory, &t, "mars", ROOM);
        assert_eq!(teacher.unwrap_err(), CommandError::NotAStudent);

        let stranger = engine.submit_answer(&mut directory, "nobody", "mars", ROOM);
        assert_eq!(stranger.unwrap_err(), CommandError::UnknownParticipant);

        let wrong_room = engine.submit_answer(&mut directory, &a, "mars", "math");
        assert_eq!(wrong_room.unwrap_err(), CommandError::UnknownParticipant);
    }

    #[test]
    fn test_end_is_idempotent() {
        let (mut directory, _, _, _) = classroom();
        let mut engine = PollEngine::new(600);
        let poll = engine.create(&room(), red_planet(), &mut directory).unwrap();

        let first = engine.end(ROOM);
        let second = engine.end(ROOM);

        assert_eq!(first.unwrap().id, poll.id);
        assert!(second.is_none());
        assert_eq!(engine.history(ROOM).len(), 1);
    }

    #[test]
    fn test_stale_trigger_does_not_end_newer_poll() {
        let mut directory = ParticipantDirectory::new();
        let mut engine = PollEngine::new(600);
        let old = engine.create(&room(), red_planet(), &mut directory).unwrap();
        let new = engine.create(&room(), red_planet(), &mut directory).unwrap();

        assert!(engine.end_if_current(ROOM, &old.id).is_none());
        assert_eq!(engine.active(ROOM).unwrap().id, new.id);

        assert!(engine.end_if_current(ROOM, &new.id).is_some());
        assert!(engine.end_if_current(ROOM, &new.id).is_none());
        assert_eq!(engine.history(ROOM).len(), 2);
    }

    #[test]
    fn test_late_joiner_must_answer_before_poll_ends() {
        let (mut directory, _, a, b) = classroom();
        let mut engine = PollEngine::new(600);
        engine.create(&room(), red_planet(), &mut directory).unwrap();
        engine
            .submit_answer(&mut directory, &a, "mars", ROOM)
            .unwrap();

        let late = directory.create(&"c-c".to_string(), "C".to_string(), Role::Student, &room());
        assert!(!late.has_answered);

        let outcome = engine
            .submit_answer(&mut directory, &b, "mars", ROOM)
            .unwrap();
        assert!(outcome.ended.is_none());

        let outcome = engine
            .submit_answer(&mut directory, &late.id, "venus", ROOM)
            .unwrap();
        assert!(outcome.ended.is_some());
    }

    #[test]
    fn test_departed_student_does_not_block_poll_end() {
        let (mut directory, _, a, b) = classroom();
        let mut engine = PollEngine::new(600);
        engine.create(&room(), red_planet(), &mut directory).unwrap();

        directory.remove(&b);
        let outcome = engine
            .submit_answer(&mut directory, &a, "mars", ROOM)
            .unwrap();

        assert!(outcome.ended.is_some());
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut directory = ParticipantDirectory::new();
        let s1 = directory.create(&"c1".to_string(), "S1".to_string(), Role::Student, &"science".to_string());
        let s2 = directory.create(&"c2".to_string(), "S2".to_string(), Role::Student, &"math".to_string());
        let mut engine = PollEngine::new(600);

        engine
            .create(&"science".to_string(), red_planet(), &mut directory)
            .unwrap();
        engine
            .create(&"math".to_string(), red_planet(), &mut directory)
            .unwrap();
        assert_eq!(engine.active_count(), 2);

        let outcome = engine
            .submit_answer(&mut directory, &s1.id, "mars", "science")
            .unwrap();
        assert!(outcome.ended.is_some());
        assert!(engine.active("math").is_some());
        assert!(!directory.get(&s2.id).unwrap().has_answered);

        assert!(engine.create(&"math".to_string(), red_planet(), &mut directory).is_err());
        assert!(engine.create(&"science".to_string(), red_planet(), &mut directory).is_ok());
        assert_eq!(engine.active_count(), 2);
        assert_eq!(engine.history("science").len(), 1);
        assert!(engine.history("math").is_empty());
    }
}
