use axum::Router;

use crate::state::SharedState;

/// Question bank endpoints.
pub mod catalog;
/// Swagger UI.
pub mod docs;
/// Health check endpoint.
pub mod health;
/// Session WebSocket upgrade.
pub mod websocket;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(websocket::router())
        .merge(catalog::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
