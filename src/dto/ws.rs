//! Frames exchanged over the session WebSocket.
//!
//! Every frame is a JSON object `{"event": <name>, "data": <payload>}`; events
//! without a payload omit `data`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    services::question_bank::CategoryFilter,
    state::{
        engine::{ClientCommand, GameSettings, HostAction},
        game::{ChoiceIndex, Difficulty, OPTION_COUNT},
    },
};

/// Question count used when `host:start` omits it.
pub const DEFAULT_QUESTION_COUNT: usize = 10;

/// Role requested by a `join` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JoinRole {
    /// Controls the game.
    Host,
    /// Answers questions.
    Player,
}

/// Payload of `join`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct JoinPayload {
    /// Requested role.
    pub role: JoinRole,
    /// Requested display name, players only.
    #[serde(default)]
    pub name: Option<String>,
}

/// Payload of `host:start`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    /// Answering window per question; integral floats such as `15000.0` are accepted.
    #[serde(default)]
    pub question_time_ms: Option<f64>,
    /// Number of questions to play.
    #[serde(default)]
    pub question_count: Option<f64>,
    /// Categories to draw from; `all`/`todas` or an empty list mean every category.
    #[serde(default)]
    pub categories: Vec<String>,
    /// Single-category shorthand, merged into `categories`.
    #[serde(default)]
    pub category: Option<String>,
}

/// Frames accepted from clients.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientMessage {
    /// Register as host or player.
    #[serde(rename = "join")]
    Join(JoinPayload),
    /// Start a new game.
    #[serde(rename = "host:start")]
    HostStart(StartPayload),
    /// Reveal the current question now.
    #[serde(rename = "host:reveal")]
    HostReveal,
    /// Move to the next question now.
    #[serde(rename = "host:next")]
    HostNext,
    /// Freeze the countdown.
    #[serde(rename = "host:pause")]
    HostPause,
    /// Unfreeze the countdown.
    #[serde(rename = "host:resume")]
    HostResume,
    /// Abort the game.
    #[serde(rename = "host:stop")]
    HostStop,
    /// Answer the current question with an option index.
    #[serde(rename = "player:answer")]
    PlayerAnswer(i64),
}

/// Why an inbound frame could not become a [`ClientCommand`].
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not JSON, unknown event or wrong payload shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Answer index outside `0..4`.
    #[error("answer index {0} is out of range")]
    InvalidChoice(i64),
    /// Structurally invalid game settings.
    #[error("invalid game settings: {0}")]
    InvalidSettings(String),
}

impl ClientMessage {
    /// Parse a text frame.
    pub fn from_json_str(text: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse a text frame straight into a typed command.
    pub fn parse_command(text: &str) -> Result<ClientCommand, ProtocolError> {
        Self::from_json_str(text)?.try_into()
    }
}

impl TryFrom<ClientMessage> for ClientCommand {
    type Error = ProtocolError;

    fn try_from(value: ClientMessage) -> Result<Self, Self::Error> {
        let command = match value {
            ClientMessage::Join(JoinPayload { role, name }) => ClientCommand::Join { role, name },
            ClientMessage::HostStart(payload) => ClientCommand::Start(payload.try_into()?),
            ClientMessage::HostReveal => ClientCommand::Host(HostAction::Reveal),
            ClientMessage::HostNext => ClientCommand::Host(HostAction::Next),
            ClientMessage::HostPause => ClientCommand::Host(HostAction::Pause),
            ClientMessage::HostResume => ClientCommand::Host(HostAction::Resume),
            ClientMessage::HostStop => ClientCommand::Host(HostAction::Stop),
            ClientMessage::PlayerAnswer(index) => ClientCommand::Answer(
                ChoiceIndex::try_from(index).map_err(ProtocolError::InvalidChoice)?,
            ),
        };
        Ok(command)
    }
}

impl TryFrom<StartPayload> for GameSettings {
    type Error = ProtocolError;

    fn try_from(value: StartPayload) -> Result<Self, Self::Error> {
        let question_time_ms = value
            .question_time_ms
            .map(|ms| whole_number("questionTimeMs", ms))
            .transpose()?;

        let question_count = match value
            .question_count
            .map(|count| whole_number("questionCount", count))
            .transpose()?
        {
            None => DEFAULT_QUESTION_COUNT,
            Some(count) if count >= 1 => usize::try_from(count).unwrap_or(usize::MAX),
            Some(count) => {
                return Err(ProtocolError::InvalidSettings(format!(
                    "questionCount must be at least 1, got {count}"
                )));
            }
        };

        let categories =
            CategoryFilter::from_names(value.categories.iter().chain(value.category.iter()));

        Ok(GameSettings {
            question_time_ms,
            question_count,
            categories,
        })
    }
}

/// Non-negative integral value of a numeric setting.
fn whole_number(field: &str, value: f64) -> Result<u64, ProtocolError> {
    if !value.is_finite() || value.fract() != 0.0 || value < 0.0 || value > u64::MAX as f64 {
        return Err(ProtocolError::InvalidSettings(format!(
            "{field} must be a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u64)
}

/// A player as shown in lobby and leaderboard frames.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStanding {
    /// Display name.
    pub name: String,
    /// Points accumulated in the current game.
    pub score: u32,
    /// Correct answers in the current game.
    pub correct_count: u32,
}

/// Payload of `lobby`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct LobbyPayload {
    /// A game is running or paused.
    pub started: bool,
    /// The countdown is frozen.
    pub paused: bool,
    /// Roster in join order.
    pub players: Vec<PlayerStanding>,
}

/// Payload of `question`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct QuestionPayload {
    /// Zero-based position in the game.
    pub index: usize,
    /// Number of questions in the game.
    pub total: usize,
    /// Question text.
    pub text: String,
    /// Options in display order.
    pub options: [String; OPTION_COUNT],
    /// Whether the correct option has been disclosed.
    pub revealed: bool,
    /// Correct option, `null` until revealed.
    pub correct: Option<usize>,
    /// Epoch milliseconds the countdown is measured from.
    pub started_at: u64,
    /// Answering window.
    pub duration_ms: u64,
    /// Lowercase category.
    pub category: String,
    /// Difficulty bucket.
    pub difficulty: Difficulty,
    /// Answering time left, only present while paused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_remaining_ms: Option<u64>,
}

/// Payload of `host:answers`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct AnswerCounts {
    /// Number of players currently on each option.
    pub counts: [u32; OPTION_COUNT],
}

/// Payload of `reveal`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct RevealPayload {
    /// Correct option index.
    pub correct: usize,
}

/// Payload of `end`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct EndPayload {
    /// Final standings, best first.
    pub leaderboard: Vec<PlayerStanding>,
}

/// Payload of `player:joined`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct PlayerJoinedPayload {
    /// Name the player was registered under.
    pub name: String,
}

/// Payload of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
pub struct ErrorPayload {
    /// Human readable reason.
    pub message: String,
}

/// Frames pushed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    /// Roster and status.
    #[serde(rename = "lobby")]
    Lobby(LobbyPayload),
    /// Question start, advance or snapshot.
    #[serde(rename = "question")]
    Question(QuestionPayload),
    /// Live option counts, host only.
    #[serde(rename = "host:answers")]
    HostAnswers(AnswerCounts),
    /// Correct answer disclosed.
    #[serde(rename = "reveal")]
    Reveal(RevealPayload),
    /// Countdown frozen.
    #[serde(rename = "paused")]
    Paused,
    /// Countdown running again.
    #[serde(rename = "resumed")]
    Resumed,
    /// Game over.
    #[serde(rename = "end")]
    End(EndPayload),
    /// Join acknowledgement for players.
    #[serde(rename = "player:joined")]
    PlayerJoined(PlayerJoinedPayload),
    /// Rejected request.
    #[serde(rename = "error")]
    Error(ErrorPayload),
}

impl ServerMessage {
    /// Build an `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorPayload {
            message: message.into(),
        })
    }

    /// Event name carried by this frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            ServerMessage::Lobby(_) => "lobby",
            ServerMessage::Question(_) => "question",
            ServerMessage::HostAnswers(_) => "host:answers",
            ServerMessage::Reveal(_) => "reveal",
            ServerMessage::Paused => "paused",
            ServerMessage::Resumed => "resumed",
            ServerMessage::End(_) => "end",
            ServerMessage::PlayerJoined(_) => "player:joined",
            ServerMessage::Error(_) => "error",
        }
    }
}
