use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;

/// Stable, opaque user identifier issued by the identity provider.
///
/// Duologue never interprets the contents; generated ids are UUID v7 strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Generate a fresh id (UUID v7, time-sortable).
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A registered user as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
}

/// Registration request for a new directory entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub id: UserId,
    pub email: String,
    pub username: String,
}

impl NewUser {
    /// Build a registration with a freshly generated id.
    pub fn new(email: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: UserId::generate(),
            email: email.into(),
            username: username.into(),
        }
    }
}
