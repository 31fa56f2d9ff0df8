//! Chat core for Duologue: conversation resolution, message delivery and
//! per-user sessions.
//!
//! This crate defines the ports (`DocumentStore`, `IdentityProvider`) that the
//! infrastructure layer implements. It depends only on `duologue-types` --
//! never on `duologue-infra` or any database crate.

pub mod clock;
pub mod conversation;
pub mod directory;
pub mod identity;
pub mod message;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use conversation::ConversationResolver;
pub use directory::UserDirectory;
pub use message::{MessageStore, MessageSubscription, SubscriptionHandle};
pub use session::{ChatServices, ChatSession, SessionState};
