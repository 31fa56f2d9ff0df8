//! Chat message types.
//!
//! Messages are append-only and owned by exactly one conversation. Their
//! position in the conversation is the rank by `(timestamp, seq)`.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::conversation::ConversationId;
use crate::user::UserId;

/// Store-assigned identifier of a message document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A single text message inside a two-party conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    /// Trimmed, never empty.
    pub body: String,
    /// Send time in epoch milliseconds. Non-decreasing per sender.
    pub timestamp: i64,
    /// Store insertion sequence, the tie-break for equal timestamps.
    pub seq: u64,
}

impl ChatMessage {
    /// Whether `user` wrote this message (drives sent/received rendering).
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }

    /// Delivery ordering key.
    pub fn position(&self) -> (i64, u64) {
        (self.timestamp, self.seq)
    }
}
