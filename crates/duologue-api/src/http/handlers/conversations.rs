//! Conversation and message handlers for the REST API.
//!
//! Every route acts as the caller named by [`CurrentUser`]; conversations the
//! caller does not take part in are rejected with `NOT_PARTICIPANT`.

use axum::Json;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};

use duologue_types::conversation::{Conversation, ConversationId};
use duologue_types::error::ChatError;
use duologue_types::message::{ChatMessage, MessageId};
use duologue_types::user::UserId;

use crate::http::error::AppError;
use crate::http::extractors::identity::CurrentUser;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// A conversation as seen by one participant.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub id: ConversationId,
    pub participants: [UserId; 2],
    pub partner: UserId,
}

impl ConversationView {
    fn for_user(conversation: Conversation, user: &UserId) -> Option<Self> {
        let partner = conversation.partner_of(user)?.clone();
        Some(Self {
            id: conversation.id,
            participants: conversation.participants,
            partner,
        })
    }
}

/// Body of `POST /api/v1/conversations`.
#[derive(Debug, Deserialize)]
pub struct OpenConversationRequest {
    /// Email or username of the other participant.
    pub partner: String,
}

/// Body of `POST /api/v1/conversations/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

#[derive(Debug, Serialize)]
pub struct SentMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
}

/// GET /api/v1/conversations - List the caller's conversations.
pub async fn list_conversations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<ApiResponse<Vec<ConversationView>>, AppError> {
    let timer = RequestTimer::start();

    let conversations = state
        .services
        .resolver()
        .conversations_for(&user)
        .await?
        .into_iter()
        .filter_map(|c| ConversationView::for_user(c, &user))
        .collect();

    Ok(timer
        .respond(conversations)
        .with_link("self", "/api/v1/conversations"))
}

/// POST /api/v1/conversations - Find or create the conversation with a partner.
pub async fn open_conversation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(body): Json<OpenConversationRequest>,
) -> Result<ApiResponse<ConversationView>, AppError> {
    let timer = RequestTimer::start();

    let identifier = body.partner.trim();
    if identifier.is_empty() {
        return Err(ChatError::InvalidPartner("partner identifier cannot be empty".into()).into());
    }
    let partner = state.services.directory().lookup(identifier).await?;
    let id = state.services.resolver().resolve(&user, &partner.id).await?;

    let view = state
        .services
        .resolver()
        .get(&id)
        .await?
        .and_then(|c| ConversationView::for_user(c, &user))
        .ok_or_else(|| AppError::Internal(format!("conversation '{id}' vanished after resolving")))?;
    let href = format!("/api/v1/conversations/{}/messages", view.id);
    Ok(timer.respond(view).with_link("messages", &href))
}

/// GET /api/v1/conversations/{id}/messages - Messages in delivery order.
pub async fn list_messages(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<ApiResponse<Vec<ChatMessage>>, AppError> {
    let timer = RequestTimer::start();
    let conversation_id = ConversationId::from(id);

    ensure_participant(&state, &conversation_id, &user).await?;
    let messages = state.services.messages().history(&conversation_id).await?;

    Ok(timer.respond(messages))
}

/// POST /api/v1/conversations/{id}/messages - Send a message as the caller.
pub async fn send_message(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<ApiResponse<SentMessage>, AppError> {
    let timer = RequestTimer::start();
    let conversation_id = ConversationId::from(id);

    let message_id = state
        .services
        .messages()
        .append(&conversation_id, &user, &body.body)
        .await?;

    Ok(timer
        .respond(SentMessage {
            id: message_id,
            conversation_id,
        })
        .created())
}

async fn ensure_participant(
    state: &AppState,
    conversation_id: &ConversationId,
    user: &UserId,
) -> Result<(), AppError> {
    let conversation = state
        .services
        .resolver()
        .get(conversation_id)
        .await?
        .ok_or_else(|| ChatError::ConversationNotFound(conversation_id.clone()))?;
    if !conversation.has_participant(user) {
        return Err(ChatError::NotParticipant {
            user: user.clone(),
            conversation: conversation_id.clone(),
        }
        .into());
    }
    Ok(())
}
