use thiserror::Error;

use crate::conversation::ConversationId;
use crate::user::UserId;

/// Errors reported by a document store (used by the port in duologue-core).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("query error: {0}")]
    Query(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("subscription error: {0}")]
    Subscription(String),

    #[error("operation not supported by this store: {0}")]
    Unsupported(&'static str),
}

/// Errors surfaced by conversation resolution, messaging and chat sessions.
///
/// Every kind is distinguishable by variant and by [`ChatError::code`].
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid partner: {0}")]
    InvalidPartner(String),

    #[error("no user found with email or username '{0}'")]
    PartnerNotFound(String),

    #[error("message cannot be empty")]
    EmptyMessage,

    #[error("no active conversation, select a partner first")]
    NoActiveConversation,

    #[error("lookup failed: {0}")]
    LookupFailed(StoreError),

    #[error("subscription failed: {0}")]
    SubscriptionError(StoreError),

    #[error("store write failed: {0}")]
    StoreWriteFailed(StoreError),

    #[error("no signed-in user")]
    NotSignedIn,

    #[error("invalid user: {0}")]
    InvalidUser(String),

    #[error("conversation '{0}' not found")]
    ConversationNotFound(ConversationId),

    #[error("user '{user}' is not a participant of conversation '{conversation}'")]
    NotParticipant {
        user: UserId,
        conversation: ConversationId,
    },
}

impl ChatError {
    /// Stable machine-readable code for this error kind.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::InvalidPartner(_) => "INVALID_PARTNER",
            ChatError::PartnerNotFound(_) => "PARTNER_NOT_FOUND",
            ChatError::EmptyMessage => "EMPTY_MESSAGE",
            ChatError::NoActiveConversation => "NO_ACTIVE_CONVERSATION",
            ChatError::LookupFailed(_) => "LOOKUP_FAILED",
            ChatError::SubscriptionError(_) => "SUBSCRIPTION_ERROR",
            ChatError::StoreWriteFailed(_) => "STORE_WRITE_FAILED",
            ChatError::NotSignedIn => "NOT_SIGNED_IN",
            ChatError::InvalidUser(_) => "INVALID_USER",
            ChatError::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            ChatError::NotParticipant { .. } => "NOT_PARTICIPANT",
        }
    }
}
