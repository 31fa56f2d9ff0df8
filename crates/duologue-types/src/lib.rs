//! Shared domain types for Duologue.
//!
//! Users, two-party conversations, chat messages, the generic document model
//! exchanged with document stores, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, thiserror.

pub mod config;
pub mod conversation;
pub mod document;
pub mod error;
pub mod message;
pub mod user;
