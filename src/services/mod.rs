/// Question bank REST operations.
pub mod catalog_service;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Question selection for a game.
pub mod question_bank;
/// Time-decayed scoring.
pub mod scoring;
/// Single-task session controller.
pub mod session_service;
/// Catalog store supervisor toggling degraded mode.
pub mod storage_supervisor;
/// WebSocket connection and frame handling.
pub mod websocket_service;
