//! Conversation resolver.
//!
//! Finds the single two-party conversation for a pair of users, creating it
//! on first contact. When the store offers an atomic create-if-absent the new
//! conversation is keyed by [`pair_key`], so racing resolutions converge on
//! one document. Otherwise creation is query-then-add and concurrent callers
//! may each create one; later resolutions then pick the first in store order.

use std::sync::Arc;

use serde_json::Value;

use duologue_types::conversation::{Conversation, ConversationId};
use duologue_types::document::{collections, fields};
use duologue_types::error::ChatError;
use duologue_types::user::UserId;

use crate::conversation::pair::pair_key;
use crate::directory::UserDirectory;
use crate::store::codec;
use crate::store::{CreateOutcome, DocumentStore};

pub struct ConversationResolver<S: DocumentStore> {
    store: Arc<S>,
    directory: UserDirectory<S>,
}

impl<S: DocumentStore> ConversationResolver<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            directory: UserDirectory::new(Arc::clone(&store)),
            store,
        }
    }

    /// Return the conversation between `self_id` and `partner_id`, creating it
    /// if none exists yet. Argument order does not matter.
    pub async fn resolve(
        &self,
        self_id: &UserId,
        partner_id: &UserId,
    ) -> Result<ConversationId, ChatError> {
        if self_id == partner_id {
            return Err(ChatError::InvalidPartner(
                "cannot start a conversation with yourself".to_string(),
            ));
        }
        if !self.directory.exists(partner_id).await? {
            return Err(ChatError::InvalidPartner(format!(
                "user '{partner_id}' does not exist"
            )));
        }

        if let Some(existing) = self.find(self_id, partner_id).await? {
            tracing::debug!(conversation_id = %existing, "resolved existing conversation");
            return Ok(existing);
        }

        let fields = codec::conversation_fields(self_id, partner_id);
        let id = if self.store.capabilities().transactional_create {
            let key = pair_key(self_id, partner_id);
            match self
                .store
                .create_if_absent(collections::CONVERSATIONS, &key, fields)
                .await
                .map_err(ChatError::StoreWriteFailed)?
            {
                CreateOutcome::Created => ConversationId(key),
                CreateOutcome::Existing(doc) => {
                    tracing::debug!(conversation_id = %doc.id, "lost creation race, reusing winner");
                    return Ok(ConversationId(doc.id));
                }
            }
        } else {
            ConversationId(
                self.store
                    .add(collections::CONVERSATIONS, fields)
                    .await
                    .map_err(ChatError::StoreWriteFailed)?,
            )
        };

        tracing::info!(
            conversation_id = %id,
            initiator = %self_id,
            partner = %partner_id,
            "created conversation"
        );
        Ok(id)
    }

    /// Every conversation `user_id` takes part in, in store order.
    pub async fn conversations_for(&self, user_id: &UserId) -> Result<Vec<Conversation>, ChatError> {
        let docs = self
            .store
            .query_array_contains(
                collections::CONVERSATIONS,
                fields::PARTICIPANTS,
                &Value::from(user_id.as_str()),
            )
            .await
            .map_err(ChatError::LookupFailed)?;

        Ok(docs
            .iter()
            .filter_map(|doc| match codec::conversation_from_document(doc) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    tracing::warn!(document = %doc.id, error = %e, "skipping malformed conversation");
                    None
                }
            })
            .collect())
    }

    /// Load one conversation by id.
    pub async fn get(&self, id: &ConversationId) -> Result<Option<Conversation>, ChatError> {
        let doc = self
            .store
            .get(collections::CONVERSATIONS, id.as_str())
            .await
            .map_err(ChatError::LookupFailed)?;
        doc.map(|doc| codec::conversation_from_document(&doc))
            .transpose()
            .map_err(ChatError::LookupFailed)
    }

    async fn find(
        &self,
        self_id: &UserId,
        partner_id: &UserId,
    ) -> Result<Option<ConversationId>, ChatError> {
        Ok(self
            .conversations_for(self_id)
            .await?
            .into_iter()
            .find(|conversation| conversation.is_between(self_id, partner_id))
            .map(|conversation| conversation.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use futures_util::future::join_all;

    use crate::store::memory::MemoryDocumentStore;
    use crate::testing::{FlakyStore, register};

    async fn seeded<S: DocumentStore>(store: S) -> (Arc<S>, ConversationResolver<S>) {
        let store = Arc::new(store);
        register(&store, "u1", "alice@x.com", "alice").await;
        register(&store, "u2", "bob@x.com", "bob").await;
        register(&store, "u3", "carol@x.com", "carol").await;
        let resolver = ConversationResolver::new(Arc::clone(&store));
        (store, resolver)
    }

    async fn conversation_count<S: DocumentStore>(store: &S, user: &str) -> usize {
        store
            .query_array_contains(collections::CONVERSATIONS, fields::PARTICIPANTS, &Value::from(user))
            .await
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn test_resolve_twice_returns_same_id_and_one_document() {
        let (store, resolver) = seeded(MemoryDocumentStore::new()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let first = resolver.resolve(&u1, &u2).await.unwrap();
        let second = resolver.resolve(&u1, &u2).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(conversation_count(store.as_ref(), "u1").await, 1);
    }

    #[tokio::test]
    async fn test_resolve_is_symmetric() {
        let (_store, resolver) = seeded(MemoryDocumentStore::new()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let ab = resolver.resolve(&u1, &u2).await.unwrap();
        let ba = resolver.resolve(&u2, &u1).await.unwrap();
        assert_eq!(ab, ba);
    }

    #[tokio::test]
    async fn test_resolve_is_symmetric_without_transactions() {
        let (store, resolver) = seeded(MemoryDocumentStore::new().without_transactions()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let ab = resolver.resolve(&u1, &u2).await.unwrap();
        let ba = resolver.resolve(&u2, &u1).await.unwrap();
        assert_eq!(ab, ba);
        assert_eq!(conversation_count(store.as_ref(), "u2").await, 1);
    }

    #[tokio::test]
    async fn test_distinct_pairs_get_distinct_conversations() {
        let (_store, resolver) = seeded(MemoryDocumentStore::new()).await;
        let (u1, u2, u3) = (UserId::from("u1"), UserId::from("u2"), UserId::from("u3"));

        let with_bob = resolver.resolve(&u1, &u2).await.unwrap();
        let with_carol = resolver.resolve(&u1, &u3).await.unwrap();
        assert_ne!(with_bob, with_carol);

        let listed = resolver.conversations_for(&u1).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(resolver.conversations_for(&u2).await.unwrap()[0].is_between(&u1, &u2));
    }

    #[tokio::test]
    async fn test_resolve_rejects_self_and_unknown_partner() {
        let (store, resolver) = seeded(MemoryDocumentStore::new()).await;
        let u1 = UserId::from("u1");

        let err = resolver.resolve(&u1, &u1).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidPartner(_)));

        let err = resolver.resolve(&u1, &UserId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, ChatError::InvalidPartner(_)));
        assert_eq!(conversation_count(store.as_ref(), "u1").await, 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolves_converge_with_create_if_absent() {
        let (store, resolver) = seeded(FlakyStore::new().interleaved()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        let ids = join_all((0..8).map(|i| {
            let (a, b) = if i % 2 == 0 { (&u1, &u2) } else { (&u2, &u1) };
            resolver.resolve(a, b)
        }))
        .await;

        let first = ids[0].as_ref().unwrap().clone();
        assert!(ids.iter().all(|id| id.as_ref().unwrap() == &first));
        assert_eq!(conversation_count(store.as_ref(), "u1").await, 1);
        assert_eq!(first.as_str(), pair_key(&u1, &u2));
    }

    #[tokio::test]
    async fn test_racing_resolves_without_transactions_settle_on_first_document() {
        let (store, resolver) = seeded(FlakyStore::without_transactions().interleaved()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        join_all((0..4).map(|_| resolver.resolve(&u1, &u2))).await;

        // Duplicates are possible here; later resolutions agree on the first.
        let docs = store
            .query_array_contains(collections::CONVERSATIONS, fields::PARTICIPANTS, &Value::from("u1"))
            .await
            .unwrap();
        assert!(!docs.is_empty());
        let settled = resolver.resolve(&u2, &u1).await.unwrap();
        assert_eq!(settled.as_str(), docs[0].id);
        assert_eq!(resolver.resolve(&u1, &u2).await.unwrap(), settled);
    }

    #[tokio::test]
    async fn test_query_failure_is_lookup_failed() {
        let (store, resolver) = seeded(FlakyStore::new()).await;
        store.fail_reads.store(true, Ordering::SeqCst);

        let err = resolver
            .resolve(&UserId::from("u1"), &UserId::from("u2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::LookupFailed(_)));
    }

    #[tokio::test]
    async fn test_creation_failure_is_store_write_failed() {
        for store in [FlakyStore::new(), FlakyStore::without_transactions()] {
            let (store, resolver) = seeded(store).await;
            store.fail_writes.store(true, Ordering::SeqCst);

            let err = resolver
                .resolve(&UserId::from("u1"), &UserId::from("u2"))
                .await
                .unwrap_err();
            assert!(matches!(err, ChatError::StoreWriteFailed(_)));
        }
    }

    #[tokio::test]
    async fn test_existing_conversation_is_reused_without_writes() {
        let (store, resolver) = seeded(FlakyStore::new()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));
        resolver.resolve(&u1, &u2).await.unwrap();

        let writes = store.write_count();
        resolver.resolve(&u2, &u1).await.unwrap();
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_get_loads_conversation() {
        let (_store, resolver) = seeded(MemoryDocumentStore::new()).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));
        let id = resolver.resolve(&u1, &u2).await.unwrap();

        let conversation = resolver.get(&id).await.unwrap().unwrap();
        assert_eq!(conversation.participants, [u1, u2]);
        assert!(resolver.get(&ConversationId::from("nope")).await.unwrap().is_none());
    }
}
