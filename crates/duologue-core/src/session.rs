//! Per-user chat session.
//!
//! A `ChatSession` owns the active-conversation pointer and the handle of the
//! live subscription attached to it. Selecting a partner always tears down
//! the previous subscription before anything else happens, so at most one
//! feed is ever live per session.

use std::sync::Arc;

use duologue_types::conversation::ConversationId;
use duologue_types::error::ChatError;
use duologue_types::message::MessageId;
use duologue_types::user::{User, UserId};

use crate::clock::Clock;
use crate::conversation::ConversationResolver;
use crate::directory::UserDirectory;
use crate::identity::IdentityProvider;
use crate::message::{MessageStore, MessageSubscription, SubscriptionHandle};
use crate::store::DocumentStore;

/// The chat components over one store, shared by every session.
pub struct ChatServices<S: DocumentStore> {
    store: Arc<S>,
    directory: Arc<UserDirectory<S>>,
    resolver: Arc<ConversationResolver<S>>,
    messages: Arc<MessageStore<S>>,
}

impl<S: DocumentStore> Clone for ChatServices<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            resolver: Arc::clone(&self.resolver),
            messages: Arc::clone(&self.messages),
        }
    }
}

impl<S: DocumentStore> ChatServices<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::from_parts(Arc::clone(&store), MessageStore::new(store))
    }

    /// Services whose message timestamps come from `clock`.
    pub fn with_clock(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self::from_parts(Arc::clone(&store), MessageStore::with_clock(store, clock))
    }

    fn from_parts(store: Arc<S>, messages: MessageStore<S>) -> Self {
        Self {
            directory: Arc::new(UserDirectory::new(Arc::clone(&store))),
            resolver: Arc::new(ConversationResolver::new(Arc::clone(&store))),
            messages: Arc::new(messages),
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn directory(&self) -> &UserDirectory<S> {
        &self.directory
    }

    pub fn resolver(&self) -> &ConversationResolver<S> {
        &self.resolver
    }

    pub fn messages(&self) -> &MessageStore<S> {
        &self.messages
    }

    /// Open a session for whoever `identity` reports as signed in.
    pub fn session(&self, identity: &impl IdentityProvider) -> Result<ChatSession<S>, ChatError> {
        ChatSession::new(self.clone(), identity)
    }
}

/// Where a session is in partner selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    NoConversation,
    Resolving,
    Active(ConversationId),
}

pub struct ChatSession<S: DocumentStore> {
    user_id: UserId,
    services: ChatServices<S>,
    state: SessionState,
    partner: Option<User>,
    subscription: Option<SubscriptionHandle>,
}

impl<S: DocumentStore> ChatSession<S> {
    /// Fails with `NotSignedIn` when the identity provider has no user.
    pub fn new(services: ChatServices<S>, identity: &impl IdentityProvider) -> Result<Self, ChatError> {
        let user_id = identity.current_user_id().ok_or(ChatError::NotSignedIn)?;
        Ok(Self {
            user_id,
            services,
            state: SessionState::NoConversation,
            partner: None,
            subscription: None,
        })
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn active_conversation(&self) -> Option<&ConversationId> {
        match &self.state {
            SessionState::Active(id) => Some(id),
            _ => None,
        }
    }

    /// Profile of the partner in the active conversation.
    pub fn partner(&self) -> Option<&User> {
        self.partner.as_ref()
    }

    /// Switch to the conversation with the user matching `identifier` (exact
    /// email first, then exact username) and start its live feed.
    ///
    /// The previous feed is cancelled first. On any failure the session is
    /// left without an active conversation.
    pub async fn select_partner(&mut self, identifier: &str) -> Result<MessageSubscription, ChatError> {
        self.teardown();
        self.state = SessionState::Resolving;

        match self.open(identifier).await {
            Ok((partner, subscription)) => {
                tracing::info!(
                    user_id = %self.user_id,
                    partner = %partner.id,
                    conversation_id = %subscription.conversation_id(),
                    "conversation selected"
                );
                self.state = SessionState::Active(subscription.conversation_id().clone());
                self.partner = Some(partner);
                self.subscription = Some(subscription.handle());
                Ok(subscription)
            }
            Err(e) => {
                tracing::debug!(user_id = %self.user_id, identifier, error = %e, "partner selection failed");
                self.state = SessionState::NoConversation;
                Err(e)
            }
        }
    }

    /// Append `text` to the active conversation as this session's user.
    pub async fn send(&self, text: &str) -> Result<MessageId, ChatError> {
        let conversation_id = self
            .active_conversation()
            .ok_or(ChatError::NoActiveConversation)?;
        self.services
            .messages()
            .append(conversation_id, &self.user_id, text)
            .await
    }

    /// Cancel the live feed and drop the active conversation.
    pub fn close(&mut self) {
        self.teardown();
        self.state = SessionState::NoConversation;
    }

    async fn open(&self, identifier: &str) -> Result<(User, MessageSubscription), ChatError> {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return Err(ChatError::InvalidPartner("partner identifier cannot be empty".into()));
        }

        let partner = self.services.directory().lookup(identifier).await?;
        let conversation_id = self
            .services
            .resolver()
            .resolve(&self.user_id, &partner.id)
            .await?;
        let subscription = self.services.messages().subscribe(&conversation_id);
        Ok((partner, subscription))
    }

    fn teardown(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.cancel();
        }
        self.partner = None;
    }
}

impl<S: DocumentStore> Drop for ChatSession<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
