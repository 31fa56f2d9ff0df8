//! User directory over the `users` collection.
//!
//! Profiles are written at registration time under the user's stable id and
//! are looked up by email first, then by username. Identifiers are matched
//! exactly; the first document in store order wins when several match.

use std::sync::Arc;

use serde_json::Value;

use duologue_types::document::{collections, fields};
use duologue_types::error::{ChatError, StoreError};
use duologue_types::user::{NewUser, User, UserId};

use crate::store::DocumentStore;
use crate::store::codec;

/// Registration and lookup of user profiles.
pub struct UserDirectory<S: DocumentStore> {
    store: Arc<S>,
}

impl<S: DocumentStore> Clone for UserDirectory<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: DocumentStore> UserDirectory<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Write the profile document `users/{id}`.
    ///
    /// Email and username must be non-empty after trimming and not already
    /// taken by another user. The uniqueness check is best-effort: two
    /// concurrent registrations can still race.
    pub async fn register(&self, new_user: NewUser) -> Result<User, ChatError> {
        let id = new_user.id.as_str().trim();
        let email = new_user.email.trim();
        let username = new_user.username.trim();

        if id.is_empty() {
            return Err(ChatError::InvalidUser("user id cannot be empty".into()));
        }
        if email.is_empty() {
            return Err(ChatError::InvalidUser("email cannot be empty".into()));
        }
        if username.is_empty() {
            return Err(ChatError::InvalidUser("username cannot be empty".into()));
        }

        let user_id = UserId::from(id);
        if let Some(other) = self.find_by_email(email).await?
            && other.id != user_id
        {
            return Err(ChatError::InvalidUser(format!(
                "email '{email}' is already registered"
            )));
        }
        if let Some(other) = self.find_by_username(username).await?
            && other.id != user_id
        {
            return Err(ChatError::InvalidUser(format!(
                "username '{username}' is already taken"
            )));
        }

        self.store
            .set(collections::USERS, id, codec::user_fields(email, username))
            .await
            .map_err(ChatError::StoreWriteFailed)?;

        tracing::info!(user_id = %user_id, username, "registered user");

        Ok(User {
            id: user_id,
            email: email.to_string(),
            username: username.to_string(),
        })
    }

    /// Whether a profile exists for `id`.
    pub async fn exists(&self, id: &UserId) -> Result<bool, ChatError> {
        Ok(self.get(id).await?.is_some())
    }

    pub async fn get(&self, id: &UserId) -> Result<Option<User>, ChatError> {
        let doc = self
            .store
            .get(collections::USERS, id.as_str())
            .await
            .map_err(ChatError::LookupFailed)?;
        match doc {
            Some(doc) => Ok(Some(
                codec::user_from_document(&doc).map_err(ChatError::LookupFailed)?,
            )),
            None => Ok(None),
        }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, ChatError> {
        self.find_by(fields::EMAIL, email).await
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, ChatError> {
        self.find_by(fields::USERNAME, username).await
    }

    /// Resolve an identifier that may be either an email or a username.
    ///
    /// Email matches take precedence. Returns `PartnerNotFound` when neither
    /// matches and `LookupFailed` when the store cannot be read.
    pub async fn lookup(&self, identifier: &str) -> Result<User, ChatError> {
        if let Some(user) = self.find_by_email(identifier).await? {
            return Ok(user);
        }
        if let Some(user) = self.find_by_username(identifier).await? {
            return Ok(user);
        }
        Err(ChatError::PartnerNotFound(identifier.to_string()))
    }

    async fn find_by(&self, field: &str, value: &str) -> Result<Option<User>, ChatError> {
        let docs = self
            .store
            .query_equals(collections::USERS, field, &Value::from(value))
            .await
            .map_err(ChatError::LookupFailed)?;

        // First decodable match in store order.
        for doc in &docs {
            match codec::user_from_document(doc) {
                Ok(user) => return Ok(Some(user)),
                Err(StoreError::Query(reason)) => {
                    tracing::warn!(document = %doc.id, %reason, "skipping malformed user document");
                }
                Err(e) => return Err(ChatError::LookupFailed(e)),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::store::memory::MemoryDocumentStore;
    use crate::testing::FlakyStore;

    fn directory() -> UserDirectory<MemoryDocumentStore> {
        UserDirectory::new(Arc::new(MemoryDocumentStore::new()))
    }

    fn new_user(id: &str, email: &str, username: &str) -> NewUser {
        NewUser {
            id: UserId::from(id),
            email: email.into(),
            username: username.into(),
        }
    }

    #[tokio::test]
    async fn test_register_then_get() {
        let dir = directory();
        let user = dir
            .register(new_user("u1", " alice@x.com ", "alice"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@x.com");

        let fetched = dir.get(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(fetched, user);
        assert!(dir.exists(&UserId::from("u1")).await.unwrap());
        assert!(!dir.exists(&UserId::from("u2")).await.unwrap());
    }

    #[tokio::test]
    async fn test_register_rejects_blank_fields() {
        let dir = directory();
        for (id, email, username) in [("", "a@x.com", "a"), ("u1", "  ", "a"), ("u1", "a@x.com", "")] {
            let err = dir.register(new_user(id, email, username)).await.unwrap_err();
            assert!(matches!(err, ChatError::InvalidUser(_)), "{err:?}");
        }
    }

    #[tokio::test]
    async fn test_register_rejects_taken_email_and_username() {
        let dir = directory();
        dir.register(new_user("u1", "alice@x.com", "alice")).await.unwrap();

        let err = dir
            .register(new_user("u2", "alice@x.com", "alice2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidUser(_)));

        let err = dir
            .register(new_user("u2", "other@x.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::InvalidUser(_)));
    }

    #[tokio::test]
    async fn test_reregistering_same_id_updates_profile() {
        let dir = directory();
        dir.register(new_user("u1", "alice@x.com", "alice")).await.unwrap();
        dir.register(new_user("u1", "alice@x.com", "ally")).await.unwrap();

        let user = dir.get(&UserId::from("u1")).await.unwrap().unwrap();
        assert_eq!(user.username, "ally");
    }

    #[tokio::test]
    async fn test_lookup_prefers_email_then_username() {
        let dir = directory();
        dir.register(new_user("u1", "bob", "robert")).await.unwrap();
        dir.register(new_user("u2", "b@x.com", "bob")).await.unwrap();

        // "bob" is u1's email and u2's username; email wins.
        assert_eq!(dir.lookup("bob").await.unwrap().id, UserId::from("u1"));
        assert_eq!(dir.lookup("robert").await.unwrap().id, UserId::from("u1"));
        assert_eq!(dir.lookup("b@x.com").await.unwrap().id, UserId::from("u2"));
    }

    #[tokio::test]
    async fn test_lookup_is_case_sensitive_and_reports_not_found() {
        let dir = directory();
        dir.register(new_user("u1", "alice@x.com", "alice")).await.unwrap();

        let err = dir.lookup("Alice").await.unwrap_err();
        assert!(matches!(err, ChatError::PartnerNotFound(ref id) if id == "Alice"));
    }

    #[tokio::test]
    async fn test_lookup_surfaces_store_failures() {
        let store = Arc::new(FlakyStore::new());
        let dir = UserDirectory::new(Arc::clone(&store));
        store.fail_reads.store(true, Ordering::SeqCst);

        let err = dir.lookup("alice").await.unwrap_err();
        assert!(matches!(err, ChatError::LookupFailed(_)));
    }

    #[tokio::test]
    async fn test_malformed_profiles_are_skipped() {
        let store = Arc::new(MemoryDocumentStore::new());
        let mut broken = duologue_types::document::Fields::new();
        broken.insert(fields::USERNAME.into(), Value::from("alice"));
        store.set(collections::USERS, "broken", broken).await.unwrap();

        let dir = UserDirectory::new(Arc::clone(&store));
        dir.register(new_user("u1", "alice@x.com", "alice2")).await.unwrap();

        // The malformed document matches by username but cannot be decoded.
        let err = dir.lookup("alice").await.unwrap_err();
        assert!(matches!(err, ChatError::PartnerNotFound(_)));
        assert_eq!(dir.lookup("alice2").await.unwrap().id, UserId::from("u1"));
    }
}
