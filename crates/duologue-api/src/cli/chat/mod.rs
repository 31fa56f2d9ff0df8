//! Interactive CLI chat between two users.
//!
//! Incoming messages are printed above the prompt while the user types.
//! Slash commands switch partners or leave. Entry point:
//! `loop_runner::run_chat_loop`.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
