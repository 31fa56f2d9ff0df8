//! Message persistence and ordered live delivery.
//!
//! - `store` -- `MessageStore`: append with per-sender monotonic timestamps,
//!   history reads, and live subscriptions
//! - `subscription` -- `MessageSubscription` and its cancellable handle

pub mod store;
pub mod subscription;

pub use store::MessageStore;
pub use subscription::{MessageSubscription, SubscriptionHandle};
