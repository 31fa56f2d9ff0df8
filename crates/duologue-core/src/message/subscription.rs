//! Cancellable, ordered stream of messages for one conversation.

use std::collections::VecDeque;
use std::fmt;

use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use duologue_types::conversation::ConversationId;
use duologue_types::document::ChangeKind;
use duologue_types::error::ChatError;
use duologue_types::message::ChatMessage;

use crate::store::ChangeStream;
use crate::store::codec;

/// Live feed of a conversation's messages.
///
/// Existing messages come first in `(timestamp, seq)` order, then every
/// message added afterwards in the order the store reports it. A store
/// failure is yielded once as [`ChatError::SubscriptionError`] and ends the
/// feed. Dropping the subscription tears down the underlying live query.
pub struct MessageSubscription {
    conversation_id: ConversationId,
    feed: Option<ChangeStream>,
    pending: VecDeque<ChatMessage>,
    cancel: CancellationToken,
}

impl fmt::Debug for MessageSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageSubscription")
            .field("conversation_id", &self.conversation_id)
            .field("pending", &self.pending.len())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Remote control for a [`MessageSubscription`], usable from any task.
#[derive(Debug, Clone)]
pub struct SubscriptionHandle {
    conversation_id: ConversationId,
    cancel: CancellationToken,
}

impl SubscriptionHandle {
    /// Stop delivery. Pending and future messages are discarded.
    pub fn cancel(&self) {
        if !self.cancel.is_cancelled() {
            tracing::debug!(conversation_id = %self.conversation_id, "subscription cancelled");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }
}

impl MessageSubscription {
    pub(crate) fn new(conversation_id: ConversationId, feed: ChangeStream) -> Self {
        Self {
            conversation_id,
            feed: Some(feed),
            pending: VecDeque::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    pub fn handle(&self) -> SubscriptionHandle {
        SubscriptionHandle {
            conversation_id: self.conversation_id.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Next message, or `None` once the feed has ended or been cancelled.
    pub async fn next(&mut self) -> Option<Result<ChatMessage, ChatError>> {
        loop {
            if self.cancel.is_cancelled() {
                self.shutdown();
                return None;
            }
            if let Some(message) = self.pending.pop_front() {
                return Some(Ok(message));
            }

            let feed = self.feed.as_mut()?;
            let batch = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => continue,
                batch = feed.next() => batch,
            };

            match batch {
                Some(Ok(batch)) => {
                    for change in batch.changes {
                        if change.kind != ChangeKind::Added {
                            continue;
                        }
                        match codec::message_from_document(&self.conversation_id, &change.document) {
                            Ok(message) => self.pending.push_back(message),
                            Err(e) => tracing::warn!(
                                conversation_id = %self.conversation_id,
                                document = %change.document.id,
                                error = %e,
                                "skipping undecodable message"
                            ),
                        }
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(conversation_id = %self.conversation_id, error = %e, "live query failed");
                    self.shutdown();
                    return Some(Err(ChatError::SubscriptionError(e)));
                }
                None => {
                    self.shutdown();
                    return None;
                }
            }
        }
    }

    /// Adapt into a `Stream`, for consumers that combine it with other sources.
    pub fn into_stream(self) -> impl Stream<Item = Result<ChatMessage, ChatError>> + Send {
        futures_util::stream::unfold(self, |mut subscription| async move {
            subscription.next().await.map(|item| (item, subscription))
        })
    }

    fn shutdown(&mut self) {
        self.feed = None;
        self.pending.clear();
    }
}

impl Drop for MessageSubscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
