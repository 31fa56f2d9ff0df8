//! Two-party conversation resolution.

pub mod pair;
pub mod resolver;

pub use resolver::ConversationResolver;
