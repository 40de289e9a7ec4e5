/// Session engine applying commands to the game.
pub mod engine;
/// Questions, players and the session record.
pub mod game;
/// Per-question answer bookkeeping.
pub mod ledger;
/// Reveal and advance countdowns.
pub mod scheduler;
/// Session lifecycle phases and transitions.
pub mod state_machine;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, watch};

use crate::{
    config::AppConfig,
    dao::catalog_store::CatalogStore,
    error::ServiceError,
    services::session_service::{SessionHandle, SessionInbox},
    state::game::ConnectionId,
};

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

#[derive(Clone)]
/// Handle used to push frames to a connected WebSocket client.
pub struct ClientConnection {
    /// Connection identifier, also used as player/host identity.
    pub id: ConnectionId,
    /// Feed of the socket writer task.
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Central application state: configuration, storage handle, sockets and the session controller.
pub struct AppState {
    config: Arc<AppConfig>,
    catalog_store: RwLock<Option<Arc<dyn CatalogStore>>>,
    degraded: watch::Sender<bool>,
    connections: DashMap<ConnectionId, ClientConnection>,
    session: SessionHandle,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The returned inbox must be handed to the session controller. The
    /// application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> (SharedState, SessionInbox) {
        let (degraded_tx, _rx) = watch::channel(true);
        let (session, inbox) = SessionHandle::channel();
        let state = Arc::new(Self {
            config: Arc::new(config),
            catalog_store: RwLock::new(None),
            degraded: degraded_tx,
            connections: DashMap::new(),
            session,
        });
        (state, inbox)
    }

    /// Runtime configuration.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Sender side of the session controller.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Registry of open WebSocket connections.
    pub fn connections(&self) -> &DashMap<ConnectionId, ClientConnection> {
        &self.connections
    }

    /// Obtain a handle to the current catalog store, if one is installed.
    pub async fn catalog_store(&self) -> Option<Arc<dyn CatalogStore>> {
        let guard = self.catalog_store.read().await;
        guard.as_ref().cloned()
    }

    /// Current catalog store, or [`ServiceError::Degraded`] when none is installed.
    pub async fn require_catalog_store(&self) -> Result<Arc<dyn CatalogStore>, ServiceError> {
        self.catalog_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new catalog store implementation and leave degraded mode.
    pub async fn install_catalog_store(&self, store: Arc<dyn CatalogStore>) {
        {
            let mut guard = self.catalog_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current catalog store and enter degraded mode.
    pub async fn clear_catalog_store(&self) {
        {
            let mut guard = self.catalog_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::catalog_store::memory::MemoryCatalogStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let (state, _inbox) = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_catalog_store().await,
            Err(ServiceError::Degraded)
        ));

        state
            .install_catalog_store(Arc::new(MemoryCatalogStore::default()))
            .await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_catalog_store().await;
        assert!(state.is_degraded());
    }
}
