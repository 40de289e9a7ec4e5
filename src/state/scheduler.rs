//! Reveal/advance countdowns for the current question.
//!
//! At most one timer is pending at any time. Every armed timer carries a
//! [`TimerToken`]; a firing is only honoured when its token is still the
//! pending one, so a timer that was cancelled but still delivered is ignored.

use std::time::Duration;

/// What a timer does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// End the answering window and reveal the correct option.
    Reveal,
    /// Leave the answer review and move to the next question.
    Advance,
}

/// Identity of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken {
    /// Monotonic id, never reused within a process.
    pub id: u64,
    /// Transition the timer triggers.
    pub kind: TimerKind,
    /// Question the timer was armed for.
    pub question_index: usize,
}

/// Backend that actually waits and reports firings.
pub trait TimerSink: Send {
    /// Deliver `token` back to the session after `delay`.
    fn arm(&mut self, token: TimerToken, delay: Duration);
    /// Best-effort cancellation of an armed timer.
    fn disarm(&mut self, token: TimerToken);
}

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    token: TimerToken,
    armed_at_ms: u64,
    delay_ms: u64,
}

#[derive(Debug, Clone, Copy)]
struct FrozenTimer {
    question_index: usize,
    remaining_ms: u64,
}

/// Countdown scheduler tied to the session state machine.
pub struct CountdownScheduler<S> {
    sink: S,
    next_delay: Duration,
    next_id: u64,
    pending: Option<PendingTimer>,
    frozen: Option<FrozenTimer>,
}

impl<S: TimerSink> CountdownScheduler<S> {
    /// Scheduler that waits `next_delay` between a reveal and the next question.
    pub fn new(sink: S, next_delay: Duration) -> Self {
        Self {
            sink,
            next_delay,
            next_id: 0,
            pending: None,
            frozen: None,
        }
    }

    /// Arm the reveal timer for a freshly started question.
    pub fn start_question_timer(
        &mut self,
        question_index: usize,
        duration_ms: u64,
        now_ms: u64,
    ) -> TimerToken {
        self.cancel_all();
        self.arm(TimerKind::Reveal, question_index, duration_ms, now_ms)
    }

    /// Arm the answer-review timer that follows a reveal.
    pub fn arm_advance(&mut self, question_index: usize, now_ms: u64) -> TimerToken {
        self.cancel_all();
        let delay_ms = u64::try_from(self.next_delay.as_millis()).unwrap_or(u64::MAX);
        self.arm(TimerKind::Advance, question_index, delay_ms, now_ms)
    }

    /// Freeze the pending reveal timer and return the answering time left.
    ///
    /// Returns `None`, changing nothing, when no reveal timer is pending.
    pub fn pause(&mut self, now_ms: u64) -> Option<u64> {
        let pending = self.pending.filter(|p| p.token.kind == TimerKind::Reveal)?;

        let elapsed = now_ms.saturating_sub(pending.armed_at_ms);
        let remaining_ms = pending.delay_ms.saturating_sub(elapsed);

        self.cancel_all();
        self.frozen = Some(FrozenTimer {
            question_index: pending.token.question_index,
            remaining_ms,
        });

        Some(remaining_ms)
    }

    /// Re-arm the frozen reveal timer for exactly the time that was left.
    pub fn resume(&mut self, now_ms: u64) -> Option<(TimerToken, u64)> {
        let frozen = self.frozen.take()?;
        let token = self.arm(
            TimerKind::Reveal,
            frozen.question_index,
            frozen.remaining_ms,
            now_ms,
        );
        Some((token, frozen.remaining_ms))
    }

    /// Drop every pending or frozen timer.
    pub fn cancel_all(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.sink.disarm(pending.token);
        }
        self.frozen = None;
    }

    /// Consume `token` if it is the pending timer; stale tokens return `false`.
    pub fn claim(&mut self, token: TimerToken) -> bool {
        match self.pending {
            Some(pending) if pending.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Currently pending timer, if any.
    pub fn pending(&self) -> Option<TimerToken> {
        self.pending.map(|p| p.token)
    }

    /// Whether a paused countdown is waiting to be resumed.
    pub fn is_frozen(&self) -> bool {
        self.frozen.is_some()
    }

    /// Borrow the timer backend.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    fn arm(
        &mut self,
        kind: TimerKind,
        question_index: usize,
        delay_ms: u64,
        now_ms: u64,
    ) -> TimerToken {
        self.next_id += 1;
        let token = TimerToken {
            id: self.next_id,
            kind,
            question_index,
        };
        self.pending = Some(PendingTimer {
            token,
            armed_at_ms: now_ms,
            delay_ms,
        });
        self.sink.arm(token, Duration::from_millis(delay_ms));
        token
    }
}

/// Timer sink that only records what it was asked to do; tests fire tokens by hand.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ManualTimers {
    pub armed: Vec<(TimerToken, Duration)>,
    pub disarmed: Vec<TimerToken>,
}

#[cfg(test)]
impl ManualTimers {
    /// Most recently armed timer.
    pub fn last_armed(&self) -> Option<(TimerToken, Duration)> {
        self.armed.last().copied()
    }
}

#[cfg(test)]
impl TimerSink for ManualTimers {
    fn arm(&mut self, token: TimerToken, delay: Duration) {
        self.armed.push((token, delay));
    }

    fn disarm(&mut self, token: TimerToken) {
        self.disarmed.push(token);
    }
}
