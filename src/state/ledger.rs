//! Per-question answer bookkeeping.
//!
//! Answers live on each [`SessionPlayer`] and are tagged with the question
//! index they were given for. A later answer for the same question replaces
//! the earlier one: the last submission before the reveal is the one scored.

use crate::state::game::{ChoiceIndex, OPTION_COUNT, SessionPlayer, SubmittedAnswer};

/// What happened to a recorded answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First answer of this player for the question.
    Recorded,
    /// Replaced an earlier answer for the same question.
    Overwritten,
}

/// Store `choice` as the player's answer for `question_index`.
///
/// Callers gate on session status and reveal state before calling.
pub fn record(
    player: &mut SessionPlayer,
    question_index: usize,
    choice: ChoiceIndex,
    submitted_at_ms: u64,
    elapsed_ms: Option<u64>,
) -> RecordOutcome {
    let outcome = match player.current_answer {
        Some(previous) if previous.question_index == question_index => RecordOutcome::Overwritten,
        _ => RecordOutcome::Recorded,
    };

    player.current_answer = Some(SubmittedAnswer {
        question_index,
        choice,
        submitted_at_ms,
        elapsed_ms,
    });

    outcome
}

/// Answer for `question_index`, ignoring stale answers from earlier questions.
pub fn answer_for(player: &SessionPlayer, question_index: usize) -> Option<SubmittedAnswer> {
    player
        .current_answer
        .filter(|answer| answer.question_index == question_index)
}

/// Live per-option counts for `question_index`.
pub fn counts_for<'a, I>(players: I, question_index: usize) -> [u32; OPTION_COUNT]
where
    I: IntoIterator<Item = &'a SessionPlayer>,
{
    let mut counts = [0; OPTION_COUNT];
    for answer in players
        .into_iter()
        .filter_map(|player| answer_for(player, question_index))
    {
        counts[answer.choice.get()] += 1;
    }
    counts
}

/// Forget every answer, done whenever a new question starts.
pub fn clear<'a, I>(players: I)
where
    I: IntoIterator<Item = &'a mut SessionPlayer>,
{
    for player in players {
        player.current_answer = None;
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    fn player(name: &str) -> SessionPlayer {
        SessionPlayer::new(Uuid::new_v4(), name.into())
    }

    fn choice(index: i64) -> ChoiceIndex {
        ChoiceIndex::try_from(index).unwrap()
    }

    #[test]
    fn second_answer_overwrites_choice_and_timestamp() {
        let mut ana = player("ana");

        assert_eq!(
            record(&mut ana, 0, choice(1), 1_000, Some(0)),
            RecordOutcome::Recorded
        );
        assert_eq!(
            record(&mut ana, 0, choice(2), 6_000, Some(5_000)),
            RecordOutcome::Overwritten
        );

        let answer = answer_for(&ana, 0).unwrap();
        assert_eq!(answer.choice.get(), 2);
        assert_eq!(answer.submitted_at_ms, 6_000);
        assert_eq!(answer.elapsed_ms, Some(5_000));
        assert_eq!(counts_for([&ana], 0), [0, 0, 1, 0]);
    }

    #[test]
    fn answers_for_a_new_question_are_not_overwrites() {
        let mut ana = player("ana");
        record(&mut ana, 0, choice(1), 1_000, Some(0));

        assert_eq!(
            record(&mut ana, 1, choice(3), 2_000, Some(0)),
            RecordOutcome::Recorded
        );
    }

    #[test]
    fn stale_answers_are_excluded_from_counts() {
        let mut ana = player("ana");
        let mut ben = player("ben");
        let carl = player("carl");
        record(&mut ana, 0, choice(0), 1_000, Some(0));
        record(&mut ben, 1, choice(3), 2_000, Some(0));

        assert_eq!(counts_for([&ana, &ben, &carl], 1), [0, 0, 0, 1]);
        assert!(answer_for(&ana, 1).is_none());
    }

    #[test]
    fn clear_forgets_every_answer() {
        let mut players = vec![player("ana"), player("ben")];
        for p in players.iter_mut() {
            record(p, 0, choice(2), 1_000, Some(10));
        }

        clear(players.iter_mut());
        assert_eq!(counts_for(players.iter(), 0), [0; OPTION_COUNT]);
    }
}
