//! Infrastructure layer for Duologue.
//!
//! Contains implementations of the ports defined in `duologue-core`: the
//! SQLite document store, plus configuration loading and data directory
//! resolution.

pub mod config;
pub mod sqlite;
pub mod store;
