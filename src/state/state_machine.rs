use thiserror::Error;
use uuid::Uuid;

/// High-level phases of the trivia session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No game is running; players gather and the host configures the next game.
    Lobby,
    /// A question is on screen.
    Running(RoundPhase),
    /// The host froze the countdown mid-question.
    Paused,
    /// The last question has been played; standings are final until the next start.
    Ended,
}

/// Sub-phase of a running question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Players may answer; the reveal countdown is ticking.
    Answering,
    /// The correct answer is disclosed and scores are final for this question.
    Revealed,
}

/// Flat status exposed to clients and used by guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// See [`SessionPhase::Lobby`].
    Lobby,
    /// See [`SessionPhase::Running`].
    Running,
    /// See [`SessionPhase::Paused`].
    Paused,
    /// See [`SessionPhase::Ended`].
    Ended,
}

impl SessionPhase {
    /// Flatten into the status reported to clients.
    pub fn status(self) -> SessionStatus {
        match self {
            SessionPhase::Lobby => SessionStatus::Lobby,
            SessionPhase::Running(_) => SessionStatus::Running,
            SessionPhase::Paused => SessionStatus::Paused,
            SessionPhase::Ended => SessionStatus::Ended,
        }
    }

    /// Whether the current question has been revealed.
    ///
    /// Never true while paused: a paused session is always mid-question.
    pub fn revealed(self) -> bool {
        matches!(self, SessionPhase::Running(RoundPhase::Revealed))
    }

    /// Whether a game is in progress (running or paused).
    pub fn in_game(self) -> bool {
        matches!(self, SessionPhase::Running(_) | SessionPhase::Paused)
    }
}

/// Events that can be applied to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The host starts a game from the lobby or after a finished game.
    Start,
    /// Disclose the correct answer of the current question.
    Reveal,
    /// Move on to the next question (also leaves a pause).
    Advance,
    /// The last question is done.
    Finish,
    /// Freeze the countdown.
    Pause,
    /// Unfreeze the countdown.
    Resume,
    /// Abort the game and go back to the lobby.
    Stop,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: SessionPhase,
    /// The event that cannot be applied from this phase.
    pub event: SessionEvent,
}

/// Errors that can occur when planning a state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    /// A transition is already pending and must be applied or aborted.
    #[error("a transition is already pending")]
    AlreadyPending,
    /// The requested transition is not valid from the current phase.
    #[error(transparent)]
    InvalidTransition(InvalidTransition),
}

/// Errors that can occur when applying a planned state machine transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    /// No transition is currently pending.
    #[error("no transition is pending")]
    NoPending,
    /// Plan ID does not match the pending plan.
    #[error("pending transition {expected} does not match {got}")]
    IdMismatch {
        /// Expected plan ID.
        expected: PlanId,
        /// Provided plan ID.
        got: PlanId,
    },
}

/// Unique identifier for a planned state transition.
pub type PlanId = Uuid;

/// A validated transition that has not been applied yet.
#[derive(Debug, Clone)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// Phase the state machine will transition to.
    pub to: SessionPhase,
}

/// State machine for the session lifecycle.
///
/// Transitions needing async work first (a game start has to read the
/// catalog) are planned, then applied or aborted; the others go through
/// [`SessionStateMachine::fire`].
#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    phase: SessionPhase,
    pending: Option<Plan>,
}

impl Default for SessionStateMachine {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Lobby,
            pending: None,
        }
    }
}

impl SessionStateMachine {
    /// Create a new state machine in the lobby.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Validate that `event` can be applied and reserve the transition.
    pub fn plan(&mut self, event: SessionEvent) -> Result<Plan, PlanError> {
        if self.pending.is_some() {
            return Err(PlanError::AlreadyPending);
        }

        let next = compute_transition(self.phase, event).map_err(PlanError::InvalidTransition)?;

        let plan = Plan {
            id: Uuid::new_v4(),
            to: next,
        };
        self.pending = Some(plan.clone());

        Ok(plan)
    }

    /// Apply a planned transition and return the new phase.
    pub fn apply(&mut self, plan_id: PlanId) -> Result<SessionPhase, ApplyError> {
        let plan = self.pending.take().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            let expected = plan.id;
            self.pending = Some(plan);
            return Err(ApplyError::IdMismatch {
                expected,
                got: plan_id,
            });
        }

        self.phase = plan.to;

        Ok(self.phase)
    }

    /// Drop a planned transition, leaving the phase untouched.
    pub fn abort(&mut self, plan_id: PlanId) -> Result<(), ApplyError> {
        let plan = self.pending.as_ref().ok_or(ApplyError::NoPending)?;

        if plan.id != plan_id {
            return Err(ApplyError::IdMismatch {
                expected: plan.id,
                got: plan_id,
            });
        }

        self.pending = None;
        Ok(())
    }

    /// Plan and immediately apply a transition that needs no async work.
    pub fn fire(&mut self, event: SessionEvent) -> Result<SessionPhase, PlanError> {
        let plan = self.plan(event)?;
        self.apply(plan.id)
            .map_err(|_| PlanError::AlreadyPending)
    }
}

fn compute_transition(
    phase: SessionPhase,
    event: SessionEvent,
) -> Result<SessionPhase, InvalidTransition> {
    use RoundPhase::{Answering, Revealed};
    use SessionPhase::{Ended, Lobby, Paused, Running};

    let next = match (phase, event) {
        (Lobby | Ended, SessionEvent::Start) => Running(Answering),
        (Running(Answering), SessionEvent::Reveal) => Running(Revealed),
        (Running(_) | Paused, SessionEvent::Advance) => Running(Answering),
        (Running(_) | Paused, SessionEvent::Finish) => Ended,
        (Running(Answering), SessionEvent::Pause) => Paused,
        (Paused, SessionEvent::Resume) => Running(Answering),
        (Running(_) | Paused, SessionEvent::Stop) => Lobby,
        (from, event) => return Err(InvalidTransition { from, event }),
    };

    Ok(next)
}
