/// Question bank request and response bodies.
pub mod catalog;
/// Health check body.
pub mod health;
/// Validation helpers for submitted questions and categories.
pub mod validation;
/// Session WebSocket frames.
pub mod ws;
