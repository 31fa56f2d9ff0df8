//! REST API and WebSocket handlers.

pub mod conversations;
pub mod users;
pub mod ws;
