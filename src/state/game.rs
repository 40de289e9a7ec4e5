use indexmap::IndexMap;
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::QuestionEntity;

/// Identifier assigned to every WebSocket connection.
pub type ConnectionId = Uuid;

/// Number of answer options every question carries.
pub const OPTION_COUNT: usize = 4;
/// Display name used when a player joins without one.
pub const DEFAULT_PLAYER_NAME: &str = "Player";
/// Longest display name kept after trimming.
pub const MAX_NAME_CHARS: usize = 32;

/// Perceived difficulty of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// Easy question.
    #[serde(alias = "baja")]
    Low,
    /// Average question.
    #[serde(alias = "media")]
    Medium,
    /// Hard question.
    #[serde(alias = "alta")]
    High,
}

/// Where a question comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    /// Shipped with the pre-built question bank.
    #[serde(alias = "static")]
    Curated,
    /// Submitted at runtime through the question bank API.
    User,
}

/// A multiple-choice question as played in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    /// Question text shown to every connection.
    pub text: String,
    /// The four answer options, in display order.
    pub options: [String; OPTION_COUNT],
    /// Index of the correct option inside [`Question::options`].
    pub correct_index: usize,
    /// Lowercase category label.
    pub category: String,
    /// Difficulty bucket.
    pub difficulty: Difficulty,
    /// Curated or user-submitted.
    pub provenance: Provenance,
}

impl Question {
    /// Copy of this question with its options permuted and the correct index remapped.
    pub fn with_shuffled_options<R: Rng + ?Sized>(&self, rng: &mut R) -> Self {
        let mut order: [usize; OPTION_COUNT] = [0, 1, 2, 3];
        order.shuffle(rng);

        let options = order.map(|source| self.options[source].clone());
        let correct_index = order
            .iter()
            .position(|&source| source == self.correct_index)
            .unwrap_or(self.correct_index);

        Self {
            options,
            correct_index,
            ..self.clone()
        }
    }
}

/// Error raised when a persisted question cannot be played.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidQuestion {
    /// The question does not carry exactly four options.
    #[error("question `{text}` has {count} options, expected 4")]
    OptionCount {
        /// Offending question text.
        text: String,
        /// Number of options found.
        count: usize,
    },
    /// The correct index points outside the options.
    #[error("question `{text}` has correct index {index} out of range")]
    CorrectIndex {
        /// Offending question text.
        text: String,
        /// Index found in storage.
        index: usize,
    },
}

impl TryFrom<QuestionEntity> for Question {
    type Error = InvalidQuestion;

    fn try_from(value: QuestionEntity) -> Result<Self, Self::Error> {
        let count = value.options.len();
        let options: [String; OPTION_COUNT] =
            value
                .options
                .try_into()
                .map_err(|_| InvalidQuestion::OptionCount {
                    text: value.text.clone(),
                    count,
                })?;

        if value.answer >= OPTION_COUNT {
            return Err(InvalidQuestion::CorrectIndex {
                text: value.text,
                index: value.answer,
            });
        }

        Ok(Self {
            text: value.text,
            options,
            correct_index: value.answer,
            category: value.category.trim().to_lowercase(),
            difficulty: value.difficulty,
            provenance: value.source,
        })
    }
}

impl From<Question> for QuestionEntity {
    fn from(value: Question) -> Self {
        Self {
            text: value.text,
            options: value.options.into(),
            answer: value.correct_index,
            category: value.category,
            difficulty: value.difficulty,
            source: value.provenance,
            created_at: None,
        }
    }
}

/// Answer option picked by a player, guaranteed to be in `0..4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChoiceIndex(u8);

impl ChoiceIndex {
    /// Index as usable for slicing.
    pub fn get(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<i64> for ChoiceIndex {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match u8::try_from(value) {
            Ok(index) if usize::from(index) < OPTION_COUNT => Ok(Self(index)),
            _ => Err(value),
        }
    }
}

/// A submission recorded for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedAnswer {
    /// Question index the answer was given for.
    pub question_index: usize,
    /// Option picked.
    pub choice: ChoiceIndex,
    /// Wall-clock time of the submission.
    pub submitted_at_ms: u64,
    /// Answering time already spent on the question, pauses excluded.
    /// `None` when the question had no start time.
    pub elapsed_ms: Option<u64>,
}

/// A connected player and their running totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPlayer {
    /// Connection the player joined on.
    pub connection_id: ConnectionId,
    /// Unique display name.
    pub display_name: String,
    /// Points accumulated in the current game.
    pub score: u32,
    /// Number of questions answered correctly in the current game.
    pub correct_count: u32,
    /// Answer for the current question, if any.
    pub current_answer: Option<SubmittedAnswer>,
}

impl SessionPlayer {
    /// Fresh player with a zero score.
    pub fn new(connection_id: ConnectionId, display_name: String) -> Self {
        Self {
            connection_id,
            display_name,
            score: 0,
            correct_count: 0,
            current_answer: None,
        }
    }
}

/// The single live game session.
#[derive(Debug, Clone)]
pub struct GameSession {
    /// Connection currently acting as host.
    pub host: Option<ConnectionId>,
    /// Questions selected for the running game, options already shuffled.
    pub questions: Vec<Question>,
    /// Question being played; `Some` only while running or paused.
    pub current_index: Option<usize>,
    /// Start of the current question, shifted forward on resume so pauses are not counted.
    pub question_started_at_ms: Option<u64>,
    /// Answering window of every question in this game.
    pub question_duration_ms: u64,
    /// Answering time left, frozen while paused.
    pub paused_remaining_ms: Option<u64>,
    /// Players in join order.
    pub players: IndexMap<ConnectionId, SessionPlayer>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self {
            host: None,
            questions: Vec::new(),
            current_index: None,
            question_started_at_ms: None,
            question_duration_ms: 0,
            paused_remaining_ms: None,
            players: IndexMap::new(),
        }
    }
}

impl GameSession {
    /// Whether `connection_id` is the current host.
    pub fn is_host(&self, connection_id: ConnectionId) -> bool {
        self.host == Some(connection_id)
    }

    /// Question at the current index.
    pub fn current_question(&self) -> Option<&Question> {
        self.current_index
            .and_then(|index| self.questions.get(index))
    }

    /// Derive a display name that no other player uses, suffixing ` 2`, ` 3`, ... on collision.
    pub fn unique_display_name(&self, requested: Option<&str>) -> String {
        let trimmed = requested.map(str::trim).unwrap_or_default();
        let base: String = if trimmed.is_empty() {
            DEFAULT_PLAYER_NAME.to_string()
        } else {
            trimmed.chars().take(MAX_NAME_CHARS).collect()
        };

        let taken = |candidate: &str| {
            self.players
                .values()
                .any(|player| player.display_name == candidate)
        };

        let mut candidate = base.clone();
        let mut suffix = 1;
        while taken(&candidate) {
            suffix += 1;
            candidate = format!("{base} {suffix}");
        }
        candidate
    }

    /// Wipe everything a game accumulates while keeping the roster and host.
    pub fn reset_game_fields(&mut self) {
        self.questions.clear();
        self.current_index = None;
        self.question_started_at_ms = None;
        self.paused_remaining_ms = None;
        for player in self.players.values_mut() {
            player.score = 0;
            player.correct_count = 0;
            player.current_answer = None;
        }
    }

    /// Players ordered by descending score; equal scores keep join order.
    pub fn standings(&self) -> Vec<&SessionPlayer> {
        let mut players: Vec<&SessionPlayer> = self.players.values().collect();
        players.sort_by(|a, b| b.score.cmp(&a.score));
        players
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;

    fn question() -> Question {
        Question {
            text: "Which planet is known as the red planet?".into(),
            options: [
                "Venus".into(),
                "Mars".into(),
                "Jupiter".into(),
                "Saturn".into(),
            ],
            correct_index: 1,
            category: "science".into(),
            difficulty: Difficulty::Low,
            provenance: Provenance::Curated,
        }
    }

    #[test]
    fn shuffled_options_keep_the_correct_answer() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let shuffled = question().with_shuffled_options(&mut rng);
            assert_eq!(shuffled.options[shuffled.correct_index], "Mars");
            let mut sorted = shuffled.options.clone();
            sorted.sort();
            assert_eq!(sorted, ["Jupiter", "Mars", "Saturn", "Venus"]);
        }
    }

    #[test]
    fn display_names_are_deduplicated_with_suffix() {
        let mut session = GameSession::default();
        for _ in 0..3 {
            let name = session.unique_display_name(Some("  Ana "));
            let id = Uuid::new_v4();
            session.players.insert(id, SessionPlayer::new(id, name));
        }
        let names: Vec<_> = session
            .players
            .values()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(names, ["Ana", "Ana 2", "Ana 3"]);
    }

    #[test]
    fn blank_names_fall_back_to_default() {
        let session = GameSession::default();
        assert_eq!(session.unique_display_name(None), DEFAULT_PLAYER_NAME);
        assert_eq!(session.unique_display_name(Some("   ")), DEFAULT_PLAYER_NAME);
    }

    #[test]
    fn choice_index_rejects_out_of_range_values() {
        assert_eq!(ChoiceIndex::try_from(3).map(ChoiceIndex::get), Ok(3));
        assert!(ChoiceIndex::try_from(4).is_err());
        assert!(ChoiceIndex::try_from(-1).is_err());
    }

    #[test]
    fn standings_break_ties_by_join_order() {
        let mut session = GameSession::default();
        for (name, score) in [("first", 400), ("second", 900), ("third", 400)] {
            let id = Uuid::new_v4();
            let mut player = SessionPlayer::new(id, name.into());
            player.score = score;
            session.players.insert(id, player);
        }
        let order: Vec<_> = session
            .standings()
            .into_iter()
            .map(|p| p.display_name.as_str())
            .collect();
        assert_eq!(order, ["second", "first", "third"]);
    }

    #[test]
    fn entity_with_three_options_is_rejected() {
        let entity = QuestionEntity {
            text: "Broken".into(),
            options: vec!["a".into(), "b".into(), "c".into()],
            answer: 0,
            category: "misc".into(),
            difficulty: Difficulty::Medium,
            source: Provenance::User,
            created_at: None,
        };
        assert!(matches!(
            Question::try_from(entity),
            Err(InvalidQuestion::OptionCount { count: 3, .. })
        ));
    }
}
