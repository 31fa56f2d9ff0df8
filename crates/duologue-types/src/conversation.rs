//! Two-party conversation types.

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::user::UserId;

/// Identifier of a conversation document.
///
/// Either store-assigned or the canonical pair key of its participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A durable thread between exactly two distinct users.
///
/// `participants` keeps the order the conversation was created with
/// (`[initiator, partner]`). That order carries no meaning: two conversations
/// are for the same pair whenever their participant *sets* are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: [UserId; 2],
}

impl Conversation {
    pub fn has_participant(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }

    /// Whether this conversation binds exactly `a` and `b`, in either order.
    pub fn is_between(&self, a: &UserId, b: &UserId) -> bool {
        self.has_participant(a) && self.has_participant(b)
    }

    /// The participant that is not `user`, if `user` takes part at all.
    pub fn partner_of(&self, user: &UserId) -> Option<&UserId> {
        match &self.participants {
            [first, second] if first == user => Some(second),
            [first, second] if second == user => Some(first),
            _ => None,
        }
    }
}
