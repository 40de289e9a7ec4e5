//! Library crate for trivia-live-back, exposing modules for binaries and integration tests.

/// Runtime configuration.
pub mod config;
/// Persistence layer.
pub mod dao;
/// Wire types for REST and WebSocket.
pub mod dto;
/// Service and HTTP error types.
pub mod error;
/// Axum route trees.
pub mod routes;
/// Business logic and background tasks.
pub mod services;
/// Shared application state and the session engine.
pub mod state;
