//! Append and subscribe over `conversations/{id}/messages`.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::StreamExt;
use tokio::sync::Mutex;

use duologue_types::conversation::ConversationId;
use duologue_types::document::{ChangeKind, collections, fields};
use duologue_types::error::{ChatError, StoreError};
use duologue_types::message::{ChatMessage, MessageId};
use duologue_types::user::UserId;

use crate::clock::{Clock, SystemClock};
use crate::message::subscription::MessageSubscription;
use crate::store::DocumentStore;
use crate::store::codec;

/// Message persistence for every conversation in a store.
///
/// Timestamps never go backwards for a given sender, even if the clock does.
/// Appends to one conversation are stamped and written one at a time, so live
/// delivery sees them in the same order as a later snapshot.
pub struct MessageStore<S: DocumentStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    last_stamp: DashMap<UserId, i64>,
    write_locks: DashMap<ConversationId, Arc<Mutex<()>>>,
}

impl<S: DocumentStore> MessageStore<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            last_stamp: DashMap::new(),
            write_locks: DashMap::new(),
        }
    }

    /// Persist a message from `sender_id` and return its id.
    ///
    /// The body is trimmed; a blank body is rejected before anything is
    /// written. Returns once the store has acknowledged the write.
    pub async fn append(
        &self,
        conversation_id: &ConversationId,
        sender_id: &UserId,
        body: &str,
    ) -> Result<MessageId, ChatError> {
        let body = body.trim();
        if body.is_empty() {
            return Err(ChatError::EmptyMessage);
        }

        let conversation = self
            .store
            .get(collections::CONVERSATIONS, conversation_id.as_str())
            .await
            .map_err(ChatError::LookupFailed)?
            .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;
        let conversation =
            codec::conversation_from_document(&conversation).map_err(ChatError::LookupFailed)?;
        if !conversation.has_participant(sender_id) {
            return Err(ChatError::NotParticipant {
                user: sender_id.clone(),
                conversation: conversation_id.clone(),
            });
        }

        let write_lock = self.write_lock(conversation_id);
        let _guard = write_lock.lock().await;
        let timestamp = self.stamp(sender_id);
        let id = self
            .store
            .add(
                &collections::messages(conversation_id),
                codec::message_fields(sender_id, body, timestamp),
            )
            .await
            .map_err(ChatError::StoreWriteFailed)?;

        tracing::debug!(
            conversation_id = %conversation_id,
            sender_id = %sender_id,
            message_id = %id,
            timestamp,
            "appended message"
        );
        Ok(MessageId(id))
    }

    /// Start a live, timestamp-ordered subscription to a conversation.
    pub fn subscribe(&self, conversation_id: &ConversationId) -> MessageSubscription {
        let feed = self
            .store
            .subscribe(&collections::messages(conversation_id), fields::TIMESTAMP);
        MessageSubscription::new(conversation_id.clone(), feed)
    }

    /// The messages stored so far, in delivery order.
    pub async fn history(&self, conversation_id: &ConversationId) -> Result<Vec<ChatMessage>, ChatError> {
        let mut feed = self
            .store
            .subscribe(&collections::messages(conversation_id), fields::TIMESTAMP);
        let snapshot = match feed.next().await {
            Some(batch) => batch.map_err(ChatError::LookupFailed)?,
            None => {
                return Err(ChatError::LookupFailed(StoreError::Subscription(
                    "live query ended before its snapshot".into(),
                )));
            }
        };

        Ok(snapshot
            .changes
            .into_iter()
            .filter(|change| change.kind == ChangeKind::Added)
            .filter_map(|change| {
                codec::message_from_document(conversation_id, &change.document)
                    .inspect_err(|e| {
                        tracing::warn!(document = %change.document.id, error = %e, "skipping undecodable message");
                    })
                    .ok()
            })
            .collect())
    }

    fn write_lock(&self, conversation_id: &ConversationId) -> Arc<Mutex<()>> {
        Arc::clone(&self.write_locks.entry(conversation_id.clone()).or_default())
    }

    fn stamp(&self, sender_id: &UserId) -> i64 {
        let now = self.clock.now_millis();
        let mut last = self.last_stamp.entry(sender_id.clone()).or_insert(now);
        if *last < now {
            *last = now;
        }
        *last
    }
}
