//! Session controller: a single task owning the [`SessionEngine`].
//!
//! Sockets, timers and catalog reads all talk to the engine through one
//! channel, so commands are applied strictly one after another.

use std::{
    collections::HashMap,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::extract::ws::Message;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, sleep, timeout},
};
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ServerMessage,
    services::question_bank::Catalog,
    state::{
        SharedState,
        engine::{ClientCommand, Outbound, PendingStart, SessionEngine, StartError},
        game::ConnectionId,
        scheduler::{TimerSink, TimerToken},
    },
};

/// Everything the session controller reacts to.
#[derive(Debug)]
pub enum SessionCommand {
    /// A parsed frame from a connection.
    Client {
        /// Sender.
        connection_id: ConnectionId,
        /// Typed command.
        command: ClientCommand,
    },
    /// A frame the protocol layer refused.
    Rejected {
        /// Sender.
        connection_id: ConnectionId,
        /// Reason shown to the host.
        message: String,
    },
    /// A socket closed.
    Disconnected {
        /// Closed connection.
        connection_id: ConnectionId,
    },
    /// A countdown elapsed.
    TimerFired(TimerToken),
    /// The catalog read of a pending start finished.
    CatalogLoaded {
        /// Start waiting for the catalog.
        pending: PendingStart,
        /// Catalog or the reason it is missing.
        catalog: Result<Catalog, StartError>,
    },
}

/// Cloneable sender side of the session controller.
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<SessionCommand>,
}

/// Receiver side, consumed by [`run`].
pub struct SessionInbox {
    rx: mpsc::UnboundedReceiver<SessionCommand>,
    timer_tx: mpsc::WeakUnboundedSender<SessionCommand>,
}

impl SessionHandle {
    /// Create a connected handle/inbox pair.
    pub fn channel() -> (Self, SessionInbox) {
        let (tx, rx) = mpsc::unbounded_channel();
        let timer_tx = tx.downgrade();
        (Self { tx }, SessionInbox { rx, timer_tx })
    }

    /// Queue a command; returns `false` once the controller is gone.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.tx.send(command).is_ok()
    }

    /// Queue a parsed client command.
    pub fn client(&self, connection_id: ConnectionId, command: ClientCommand) -> bool {
        self.send(SessionCommand::Client {
            connection_id,
            command,
        })
    }

    /// Report a refused frame.
    pub fn rejected(&self, connection_id: ConnectionId, message: impl Into<String>) -> bool {
        self.send(SessionCommand::Rejected {
            connection_id,
            message: message.into(),
        })
    }

    /// Report a closed connection.
    pub fn disconnected(&self, connection_id: ConnectionId) -> bool {
        self.send(SessionCommand::Disconnected { connection_id })
    }
}

/// Wall clock in epoch milliseconds, advancing with tokio's clock.
///
/// Anchoring on [`tokio::time::Instant`] lets paused-time tests drive it.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    anchor: Instant,
    anchor_epoch_ms: u64,
}

impl SessionClock {
    /// Anchor the clock on the current system time.
    pub fn start() -> Self {
        let anchor_epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|since| u64::try_from(since.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default();
        Self {
            anchor: Instant::now(),
            anchor_epoch_ms,
        }
    }

    /// Milliseconds since the Unix epoch.
    pub fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.anchor.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.anchor_epoch_ms.saturating_add(elapsed)
    }
}

/// Timer sink backed by tokio sleeps that report back through the session channel.
pub struct TokioTimerSink {
    tx: mpsc::WeakUnboundedSender<SessionCommand>,
    tasks: HashMap<u64, JoinHandle<()>>,
}

impl TokioTimerSink {
    fn new(tx: mpsc::WeakUnboundedSender<SessionCommand>) -> Self {
        Self {
            tx,
            tasks: HashMap::new(),
        }
    }
}

impl TimerSink for TokioTimerSink {
    fn arm(&mut self, token: TimerToken, delay: Duration) {
        self.tasks.retain(|_, task| !task.is_finished());

        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SessionCommand::TimerFired(token));
            }
        });
        self.tasks.insert(token.id, task);
    }

    fn disarm(&mut self, token: TimerToken) {
        if let Some(task) = self.tasks.remove(&token.id) {
            task.abort();
        }
    }
}

/// Drive the session until every sender is gone.
pub async fn run(state: SharedState, inbox: SessionInbox) {
    let SessionInbox { mut rx, timer_tx } = inbox;
    let clock = SessionClock::start();
    let mut engine = SessionEngine::new(
        state.config().engine_settings(),
        TokioTimerSink::new(timer_tx),
    );
    info!("session controller started");

    while let Some(command) = rx.recv().await {
        let now_ms = clock.now_ms();
        let outbound = match command {
            SessionCommand::Client {
                connection_id,
                command,
            } => match command {
                ClientCommand::Join { role, name } => {
                    engine.join(connection_id, role, name.as_deref(), now_ms)
                }
                ClientCommand::Start(settings) => {
                    match engine.prepare_start(connection_id, settings) {
                        Ok(pending) => {
                            spawn_catalog_read(state.clone(), pending);
                            Vec::new()
                        }
                        Err(err) => engine.start_failed(connection_id, err),
                    }
                }
                ClientCommand::Host(action) => engine.host_action(connection_id, action, now_ms),
                ClientCommand::Answer(choice) => engine.answer(connection_id, choice, now_ms),
            },
            SessionCommand::Rejected {
                connection_id,
                message,
            } => engine.reject(connection_id, &message),
            SessionCommand::Disconnected { connection_id } => engine.disconnect(connection_id),
            SessionCommand::TimerFired(token) => {
                debug!(timer = token.id, kind = ?token.kind, "timer fired");
                engine.timer_fired(token, now_ms)
            }
            SessionCommand::CatalogLoaded { pending, catalog } => {
                engine.finish_start(pending, catalog, now_ms)
            }
        };

        deliver(&state, outbound);
    }

    info!("session controller stopped");
}

/// Read the catalog off the controller task and report back when done.
fn spawn_catalog_read(state: SharedState, pending: PendingStart) {
    tokio::spawn(async move {
        let catalog = read_catalog(&state).await;
        if !state
            .session()
            .send(SessionCommand::CatalogLoaded { pending, catalog })
        {
            warn!("session controller gone before catalog arrived");
        }
    });
}

async fn read_catalog(state: &SharedState) -> Result<Catalog, StartError> {
    let store = state
        .require_catalog_store()
        .await
        .map_err(|err| StartError::CatalogUnavailable(err.to_string()))?;

    match timeout(state.config().catalog_timeout(), store.load_catalog()).await {
        Ok(Ok(entity)) => Ok(Catalog::from(entity)),
        Ok(Err(err)) => {
            warn!(error = %err, "catalog read failed");
            Err(StartError::CatalogUnavailable(err.to_string()))
        }
        Err(_) => {
            warn!("catalog read timed out");
            Err(StartError::CatalogUnavailable("catalog read timed out".into()))
        }
    }
}

/// Push engine output to the matching sockets. Closed sockets are skipped.
pub fn deliver(state: &SharedState, outbound: Vec<Outbound>) {
    for item in outbound {
        match item {
            Outbound::Broadcast(message) => {
                let Some(frame) = encode(&message) else {
                    continue;
                };
                for connection in state.connections().iter() {
                    let _ = connection.tx.send(frame.clone());
                }
            }
            Outbound::To(connection_id, message) => {
                let Some(frame) = encode(&message) else {
                    continue;
                };
                let Some(tx) = state
                    .connections()
                    .get(&connection_id)
                    .map(|connection| connection.tx.clone())
                else {
                    debug!(connection_id = %connection_id, event = message.event_name(), "recipient already gone");
                    continue;
                };
                let _ = tx.send(frame);
            }
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, event = message.event_name(), "failed to serialize frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn clock_follows_tokio_time() {
        let clock = SessionClock::start();
        let before = clock.now_ms();
        tokio::time::advance(Duration::from_millis(6_000)).await;
        assert_eq!(clock.now_ms() - before, 6_000);
    }

    #[tokio::test(start_paused = true)]
    async fn armed_timer_reports_through_channel() {
        let (handle, mut inbox) = SessionHandle::channel();
        let mut sink = TokioTimerSink::new(inbox.timer_tx.clone());
        let token = TimerToken {
            id: 1,
            kind: crate::state::scheduler::TimerKind::Reveal,
            question_index: 0,
        };
        sink.arm(token, Duration::from_millis(500));

        let fired = inbox.rx.recv().await;
        assert!(matches!(fired, Some(SessionCommand::TimerFired(t)) if t == token));
        drop(handle);
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_reports() {
        let (handle, mut inbox) = SessionHandle::channel();
        let mut sink = TokioTimerSink::new(inbox.timer_tx.clone());
        let token = TimerToken {
            id: 7,
            kind: crate::state::scheduler::TimerKind::Advance,
            question_index: 2,
        };
        sink.arm(token, Duration::from_millis(500));
        sink.disarm(token);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(inbox.rx.try_recv().is_err());
        drop(handle);
    }
}
