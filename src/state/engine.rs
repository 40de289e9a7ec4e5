//! The live trivia session.
//!
//! [`SessionEngine`] is synchronous and owns every piece of session state. It
//! is driven by exactly one caller at a time (the session controller task), so
//! each command runs to completion before the next one, timer firings
//! included. Every operation returns the frames to deliver as [`Outbound`].

use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    dto::ws::{
        AnswerCounts, EndPayload, JoinRole, LobbyPayload, PlayerJoinedPayload, PlayerStanding,
        QuestionPayload, RevealPayload, ServerMessage,
    },
    services::{
        question_bank::{self, Catalog, CategoryFilter, SelectionError},
        scoring::ScoreRules,
    },
    state::{
        game::{ChoiceIndex, ConnectionId, GameSession, SessionPlayer},
        ledger::{self, RecordOutcome},
        scheduler::{CountdownScheduler, TimerKind, TimerSink, TimerToken},
        state_machine::{
            PlanError, PlanId, RoundPhase, SessionEvent, SessionPhase, SessionStateMachine,
            SessionStatus,
        },
    },
};

/// Host-only actions that need no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// Reveal the current question now.
    Reveal,
    /// Skip to the next question now.
    Next,
    /// Freeze the countdown.
    Pause,
    /// Unfreeze the countdown.
    Resume,
    /// Abort the game and return to the lobby.
    Stop,
}

/// Validated settings of a `host:start` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSettings {
    /// Answering window; the configured default applies when absent.
    pub question_time_ms: Option<u64>,
    /// Requested number of questions, at least one.
    pub question_count: usize,
    /// Categories to draw from.
    pub categories: CategoryFilter,
}

/// Typed commands produced by the protocol layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Register as host or player.
    Join {
        /// Requested role.
        role: JoinRole,
        /// Requested display name.
        name: Option<String>,
    },
    /// Start a game.
    Start(GameSettings),
    /// Host pacing action.
    Host(HostAction),
    /// Player answer.
    Answer(ChoiceIndex),
}

/// A frame and who should receive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    /// Every open connection.
    Broadcast(ServerMessage),
    /// One connection.
    To(ConnectionId, ServerMessage),
}

/// Tunables of the engine, derived from the application config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Answering window used when `host:start` omits one.
    pub default_question_time_ms: u64,
    /// Shortest accepted answering window.
    pub min_question_time_ms: u64,
    /// Longest accepted answering window.
    pub max_question_time_ms: u64,
    /// Review pause between a reveal and the next question.
    pub next_delay: Duration,
    /// Point bounds for correct answers.
    pub score_rules: ScoreRules,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_question_time_ms: 15_000,
            min_question_time_ms: 5_000,
            max_question_time_ms: 60_000,
            next_delay: Duration::from_millis(1_800),
            score_rules: ScoreRules::default(),
        }
    }
}

/// Reasons a start request fails. The session is left untouched in every case.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    /// The requester is not the host; answered with silence.
    #[error("only the host can start a game")]
    NotHost,
    /// A game is already running, paused or being started.
    #[error("a game is already in progress")]
    AlreadyRunning,
    /// The requested settings are out of bounds.
    #[error("invalid game settings: {0}")]
    InvalidSettings(String),
    /// No question matches the requested categories.
    #[error("no questions available for the selected categories")]
    EmptyPool,
    /// The question bank could not be read in time.
    #[error("question bank unavailable: {0}")]
    CatalogUnavailable(String),
}

impl From<SelectionError> for StartError {
    fn from(err: SelectionError) -> Self {
        match err {
            SelectionError::EmptyPool => StartError::EmptyPool,
        }
    }
}

/// A start request that passed every synchronous guard and waits for the catalog.
#[derive(Debug, Clone)]
pub struct PendingStart {
    plan_id: PlanId,
    requested_by: ConnectionId,
    duration_ms: u64,
    question_count: usize,
    categories: CategoryFilter,
}

impl PendingStart {
    /// Connection that asked for the start.
    pub fn requested_by(&self) -> ConnectionId {
        self.requested_by
    }
}

/// The single live session and its countdowns.
pub struct SessionEngine<S> {
    settings: EngineSettings,
    machine: SessionStateMachine,
    session: GameSession,
    scheduler: CountdownScheduler<S>,
    rng: StdRng,
}

impl<S: TimerSink> SessionEngine<S> {
    /// Engine in the lobby, shuffling with OS entropy.
    pub fn new(settings: EngineSettings, sink: S) -> Self {
        Self::with_rng(settings, sink, StdRng::from_os_rng())
    }

    /// Engine with a caller-provided random source.
    pub fn with_rng(settings: EngineSettings, sink: S, rng: StdRng) -> Self {
        let scheduler = CountdownScheduler::new(sink, settings.next_delay);
        Self {
            settings,
            machine: SessionStateMachine::new(),
            session: GameSession::default(),
            scheduler,
            rng,
        }
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> SessionPhase {
        self.machine.phase()
    }

    /// Read-only view of the session.
    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Countdown scheduler, exposed for inspection.
    pub fn scheduler(&self) -> &CountdownScheduler<S> {
        &self.scheduler
    }

    /// Register `connection_id` as host or player.
    pub fn join(
        &mut self,
        connection_id: ConnectionId,
        role: JoinRole,
        name: Option<&str>,
        now_ms: u64,
    ) -> Vec<Outbound> {
        let mut out = Vec::new();

        match role {
            JoinRole::Host => {
                let previous = self.session.host.replace(connection_id);
                if let Some(previous) = previous.filter(|&p| p != connection_id) {
                    info!(previous = %previous, host = %connection_id, "host replaced");
                }
                self.session.players.shift_remove(&connection_id);
                info!(connection_id = %connection_id, "host joined");

                out.push(Outbound::Broadcast(self.lobby()));
                if let Some(snapshot) = self.question_snapshot(now_ms) {
                    out.push(Outbound::To(connection_id, snapshot));
                    if self.phase().status() == SessionStatus::Paused {
                        out.push(Outbound::To(connection_id, ServerMessage::Paused));
                    }
                    if let Some(counts) = self.current_counts() {
                        out.push(Outbound::To(connection_id, counts));
                    }
                }
            }
            JoinRole::Player => {
                if self.session.is_host(connection_id) {
                    self.session.host = None;
                }

                let display_name = match self.session.players.get(&connection_id) {
                    Some(existing) => existing.display_name.clone(),
                    None => {
                        let display_name = self.session.unique_display_name(name);
                        self.session.players.insert(
                            connection_id,
                            SessionPlayer::new(connection_id, display_name.clone()),
                        );
                        display_name
                    }
                };
                info!(connection_id = %connection_id, name = %display_name, "player joined");

                out.push(Outbound::To(
                    connection_id,
                    ServerMessage::PlayerJoined(PlayerJoinedPayload { name: display_name }),
                ));
                out.push(Outbound::Broadcast(self.lobby()));
                if let Some(snapshot) = self.question_snapshot(now_ms) {
                    out.push(Outbound::To(connection_id, snapshot));
                    if self.phase().status() == SessionStatus::Paused {
                        out.push(Outbound::To(connection_id, ServerMessage::Paused));
                    }
                }
            }
        }

        out
    }

    /// Forget a closed connection. Running timers are left alone.
    pub fn disconnect(&mut self, connection_id: ConnectionId) -> Vec<Outbound> {
        if self.session.is_host(connection_id) {
            self.session.host = None;
            info!(connection_id = %connection_id, "host left, game keeps running");
        }
        if let Some(player) = self.session.players.shift_remove(&connection_id) {
            info!(connection_id = %connection_id, name = %player.display_name, "player left");
        }

        vec![Outbound::Broadcast(self.lobby())]
    }

    /// Answer an input the protocol layer refused. Only the host hears about it.
    pub fn reject(&self, connection_id: ConnectionId, message: &str) -> Vec<Outbound> {
        if self.session.is_host(connection_id) {
            vec![Outbound::To(connection_id, ServerMessage::error(message))]
        } else {
            Vec::new()
        }
    }

    /// Run the synchronous start guards and reserve the transition.
    ///
    /// The caller fetches the catalog and hands it to [`SessionEngine::finish_start`].
    pub fn prepare_start(
        &mut self,
        connection_id: ConnectionId,
        settings: GameSettings,
    ) -> Result<PendingStart, StartError> {
        if !self.session.is_host(connection_id) {
            return Err(StartError::NotHost);
        }
        if self.phase().in_game() {
            return Err(StartError::AlreadyRunning);
        }

        let duration_ms = settings
            .question_time_ms
            .unwrap_or(self.settings.default_question_time_ms);
        let (min, max) = (
            self.settings.min_question_time_ms,
            self.settings.max_question_time_ms,
        );
        if !(min..=max).contains(&duration_ms) {
            return Err(StartError::InvalidSettings(format!(
                "questionTimeMs must be between {min} and {max}, got {duration_ms}"
            )));
        }
        if settings.question_count == 0 {
            return Err(StartError::InvalidSettings(
                "questionCount must be at least 1".into(),
            ));
        }

        let plan = self
            .machine
            .plan(SessionEvent::Start)
            .map_err(|err| match err {
                PlanError::AlreadyPending | PlanError::InvalidTransition(_) => {
                    StartError::AlreadyRunning
                }
            })?;

        Ok(PendingStart {
            plan_id: plan.id,
            requested_by: connection_id,
            duration_ms,
            question_count: settings.question_count,
            categories: settings.categories,
        })
    }

    /// Complete a start once the catalog read finished (or failed).
    pub fn finish_start(
        &mut self,
        pending: PendingStart,
        catalog: Result<Catalog, StartError>,
        now_ms: u64,
    ) -> Vec<Outbound> {
        let requested_by = pending.requested_by;

        let selection = catalog.and_then(|catalog| {
            question_bank::select(
                &catalog.questions,
                pending.question_count,
                &pending.categories,
                &mut self.rng,
            )
            .map_err(StartError::from)
        });

        let questions = match selection {
            Ok(questions) => questions,
            Err(err) => {
                if let Err(abort) = self.machine.abort(pending.plan_id) {
                    warn!(error = %abort, "start plan vanished before abort");
                }
                return self.start_failed(requested_by, err);
            }
        };

        if let Err(err) = self.machine.apply(pending.plan_id) {
            warn!(error = %err, "start plan could not be applied");
            return self.start_failed(requested_by, StartError::AlreadyRunning);
        }

        self.scheduler.cancel_all();
        self.session.reset_game_fields();
        self.session.questions = questions
            .iter()
            .map(|question| question.with_shuffled_options(&mut self.rng))
            .collect();
        self.session.question_duration_ms = pending.duration_ms;

        info!(
            questions = self.session.questions.len(),
            duration_ms = pending.duration_ms,
            "game started"
        );

        let mut out = self.begin_question(0, now_ms);
        out.push(Outbound::Broadcast(self.lobby()));
        out
    }

    /// Map a failed start to the frames the requester should get.
    pub fn start_failed(&self, requested_by: ConnectionId, err: StartError) -> Vec<Outbound> {
        match err {
            StartError::NotHost => Vec::new(),
            err => {
                warn!(connection_id = %requested_by, error = %err, "start rejected");
                vec![Outbound::To(requested_by, ServerMessage::error(err.to_string()))]
            }
        }
    }

    /// Start with an already loaded catalog.
    pub fn start_with_catalog(
        &mut self,
        connection_id: ConnectionId,
        settings: GameSettings,
        catalog: Catalog,
        now_ms: u64,
    ) -> Vec<Outbound> {
        match self.prepare_start(connection_id, settings) {
            Ok(pending) => self.finish_start(pending, Ok(catalog), now_ms),
            Err(err) => self.start_failed(connection_id, err),
        }
    }

    /// Apply a host pacing action. Non-host senders are ignored.
    pub fn host_action(
        &mut self,
        connection_id: ConnectionId,
        action: HostAction,
        now_ms: u64,
    ) -> Vec<Outbound> {
        if !self.session.is_host(connection_id) {
            debug!(connection_id = %connection_id, ?action, "ignoring host action from non-host");
            return Vec::new();
        }

        match action {
            HostAction::Reveal => {
                if self.phase() != SessionPhase::Running(RoundPhase::Answering) {
                    return Vec::new();
                }
                self.scheduler.cancel_all();
                self.reveal(now_ms)
            }
            HostAction::Next => {
                if !self.phase().in_game() {
                    return Vec::new();
                }
                self.scheduler.cancel_all();
                self.advance(now_ms)
            }
            HostAction::Pause => self.pause(now_ms),
            HostAction::Resume => self.resume(now_ms),
            HostAction::Stop => self.stop(),
        }
    }

    /// Record a player's answer for the current question.
    pub fn answer(
        &mut self,
        connection_id: ConnectionId,
        choice: ChoiceIndex,
        now_ms: u64,
    ) -> Vec<Outbound> {
        if self.phase() != SessionPhase::Running(RoundPhase::Answering) {
            return Vec::new();
        }
        let Some(index) = self.session.current_index else {
            return Vec::new();
        };
        let elapsed_ms = self
            .session
            .question_started_at_ms
            .map(|started| now_ms.saturating_sub(started));
        let Some(player) = self.session.players.get_mut(&connection_id) else {
            return Vec::new();
        };

        let outcome = ledger::record(player, index, choice, now_ms, elapsed_ms);
        debug!(
            connection_id = %connection_id,
            question = index,
            choice = choice.get(),
            overwritten = outcome == RecordOutcome::Overwritten,
            "answer recorded"
        );

        match (self.session.host, self.current_counts()) {
            (Some(host), Some(counts)) => vec![Outbound::To(host, counts)],
            _ => Vec::new(),
        }
    }

    /// Handle a timer firing. Anything but the pending timer for the current state is a no-op.
    pub fn timer_fired(&mut self, token: TimerToken, now_ms: u64) -> Vec<Outbound> {
        if !self.scheduler.claim(token) {
            debug!(timer = token.id, "ignoring stale timer");
            return Vec::new();
        }
        if self.session.current_index != Some(token.question_index) {
            debug!(timer = token.id, "timer for another question");
            return Vec::new();
        }

        match (token.kind, self.phase()) {
            (TimerKind::Reveal, SessionPhase::Running(RoundPhase::Answering)) => {
                debug!(question = token.question_index, "countdown elapsed");
                self.reveal(now_ms)
            }
            (TimerKind::Advance, SessionPhase::Running(RoundPhase::Revealed)) => {
                self.advance(now_ms)
            }
            _ => {
                debug!(timer = token.id, phase = ?self.phase(), "timer no longer applies");
                Vec::new()
            }
        }
    }

    fn begin_question(&mut self, index: usize, now_ms: u64) -> Vec<Outbound> {
        self.session.current_index = Some(index);
        self.session.question_started_at_ms = Some(now_ms);
        self.session.paused_remaining_ms = None;
        ledger::clear(self.session.players.values_mut());

        self.scheduler
            .start_question_timer(index, self.session.question_duration_ms, now_ms);

        self.question_snapshot(now_ms)
            .map(Outbound::Broadcast)
            .into_iter()
            .collect()
    }

    fn reveal(&mut self, now_ms: u64) -> Vec<Outbound> {
        let Some(index) = self.session.current_index else {
            return Vec::new();
        };
        let Some(correct) = self.session.current_question().map(|q| q.correct_index) else {
            return Vec::new();
        };
        if let Err(err) = self.machine.fire(SessionEvent::Reveal) {
            warn!(error = %err, "reveal refused");
            return Vec::new();
        }

        let duration_ms = self.session.question_duration_ms;
        let rules = self.settings.score_rules;
        for player in self.session.players.values_mut() {
            let Some(answer) = ledger::answer_for(player, index) else {
                continue;
            };
            if answer.choice.get() == correct {
                player.score += rules.points_for(answer.elapsed_ms, duration_ms);
                player.correct_count += 1;
            }
        }
        info!(question = index, correct, "answer revealed");

        let mut out = vec![Outbound::Broadcast(ServerMessage::Reveal(RevealPayload {
            correct,
        }))];
        if let (Some(host), Some(counts)) = (self.session.host, self.current_counts()) {
            out.push(Outbound::To(host, counts));
        }
        out.push(Outbound::Broadcast(self.lobby()));

        self.scheduler.arm_advance(index, now_ms);
        out
    }

    fn advance(&mut self, now_ms: u64) -> Vec<Outbound> {
        let Some(index) = self.session.current_index else {
            return Vec::new();
        };
        let was_paused = self.phase() == SessionPhase::Paused;
        let next = index + 1;

        if next >= self.session.questions.len() {
            return self.finish();
        }

        if let Err(err) = self.machine.fire(SessionEvent::Advance) {
            warn!(error = %err, "advance refused");
            return Vec::new();
        }

        let mut out = self.begin_question(next, now_ms);
        if was_paused {
            out.push(Outbound::Broadcast(self.lobby()));
        }
        out
    }

    fn finish(&mut self) -> Vec<Outbound> {
        if let Err(err) = self.machine.fire(SessionEvent::Finish) {
            warn!(error = %err, "finish refused");
            return Vec::new();
        }
        self.scheduler.cancel_all();

        let leaderboard = self
            .session
            .standings()
            .into_iter()
            .map(standing)
            .collect::<Vec<_>>();
        info!(players = leaderboard.len(), "game ended");

        self.session.current_index = None;
        self.session.question_started_at_ms = None;
        self.session.paused_remaining_ms = None;
        ledger::clear(self.session.players.values_mut());

        vec![
            Outbound::Broadcast(ServerMessage::End(EndPayload { leaderboard })),
            Outbound::Broadcast(self.lobby()),
        ]
    }

    fn pause(&mut self, now_ms: u64) -> Vec<Outbound> {
        if self.phase() != SessionPhase::Running(RoundPhase::Answering) {
            return Vec::new();
        }
        let Some(remaining_ms) = self.scheduler.pause(now_ms) else {
            warn!("pause requested without a pending countdown");
            return Vec::new();
        };
        if let Err(err) = self.machine.fire(SessionEvent::Pause) {
            warn!(error = %err, "pause refused");
            return Vec::new();
        }

        self.session.paused_remaining_ms = Some(remaining_ms);
        info!(remaining_ms, "game paused");

        vec![
            Outbound::Broadcast(ServerMessage::Paused),
            Outbound::Broadcast(self.lobby()),
        ]
    }

    fn resume(&mut self, now_ms: u64) -> Vec<Outbound> {
        if self.phase() != SessionPhase::Paused {
            return Vec::new();
        }
        let Some(index) = self.session.current_index else {
            return Vec::new();
        };

        let remaining_ms = match self.scheduler.resume(now_ms) {
            Some((_, remaining_ms)) => remaining_ms,
            None => {
                let remaining_ms = self
                    .session
                    .paused_remaining_ms
                    .unwrap_or(self.session.question_duration_ms);
                self.scheduler
                    .start_question_timer(index, remaining_ms, now_ms);
                remaining_ms
            }
        };
        if let Err(err) = self.machine.fire(SessionEvent::Resume) {
            warn!(error = %err, "resume refused");
            return Vec::new();
        }

        let already_elapsed = self
            .session
            .question_duration_ms
            .saturating_sub(remaining_ms);
        self.session.question_started_at_ms = Some(now_ms.saturating_sub(already_elapsed));
        self.session.paused_remaining_ms = None;
        info!(remaining_ms, "game resumed");

        let mut out = vec![Outbound::Broadcast(ServerMessage::Resumed)];
        out.extend(self.question_snapshot(now_ms).map(Outbound::Broadcast));
        out.push(Outbound::Broadcast(self.lobby()));
        out
    }

    fn stop(&mut self) -> Vec<Outbound> {
        if !self.phase().in_game() {
            return Vec::new();
        }
        self.scheduler.cancel_all();
        if let Err(err) = self.machine.fire(SessionEvent::Stop) {
            warn!(error = %err, "stop refused");
            return Vec::new();
        }

        self.session.reset_game_fields();
        info!("game stopped by host");

        vec![Outbound::Broadcast(self.lobby())]
    }

    /// Current `lobby` frame.
    pub fn lobby(&self) -> ServerMessage {
        let status = self.phase().status();
        ServerMessage::Lobby(LobbyPayload {
            started: matches!(status, SessionStatus::Running | SessionStatus::Paused),
            paused: status == SessionStatus::Paused,
            players: self.session.players.values().map(standing).collect(),
        })
    }

    /// Current `question` frame, if a question is on screen.
    pub fn question_snapshot(&self, now_ms: u64) -> Option<ServerMessage> {
        let phase = self.phase();
        if !phase.in_game() {
            return None;
        }
        let index = self.session.current_index?;
        let question = self.session.current_question()?;
        let revealed = phase.revealed();

        Some(ServerMessage::Question(QuestionPayload {
            index,
            total: self.session.questions.len(),
            text: question.text.clone(),
            options: question.options.clone(),
            revealed,
            correct: revealed.then_some(question.correct_index),
            started_at: self.session.question_started_at_ms.unwrap_or(now_ms),
            duration_ms: self.session.question_duration_ms,
            category: question.category.clone(),
            difficulty: question.difficulty,
            paused_remaining_ms: match phase.status() {
                SessionStatus::Paused => self.session.paused_remaining_ms,
                _ => None,
            },
        }))
    }

    fn current_counts(&self) -> Option<ServerMessage> {
        let index = self.session.current_index?;
        Some(ServerMessage::HostAnswers(AnswerCounts {
            counts: ledger::counts_for(self.session.players.values(), index),
        }))
    }
}

fn standing(player: &SessionPlayer) -> PlayerStanding {
    PlayerStanding {
        name: player.display_name.clone(),
        score: player.score,
        correct_count: player.correct_count,
    }
}
