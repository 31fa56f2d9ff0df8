//! HTTP/REST API layer for Duologue.
//!
//! Axum-based REST API at `/api/v1/` with header-based caller identity,
//! envelope response format, CORS support, and a chat WebSocket at
//! `/ws/chat`.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod response;
pub mod router;
