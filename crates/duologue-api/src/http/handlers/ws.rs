//! WebSocket handler for interactive chat.
//!
//! The `/ws/chat?user=<id>` endpoint upgrades an HTTP connection to a
//! WebSocket bound to one [`ChatSession`] for the calling user. Once
//! connected, the handler:
//!
//! - **Receives commands:** Parses incoming text frames as [`WsCommand`]:
//!   selecting a partner, sending a message, or pinging.
//! - **Forwards messages:** Pushes every message of the active conversation
//!   to the client as a `message` frame, starting with the existing history.
//!
//! Selecting another partner replaces the live feed. Disconnecting drops the
//! session, which tears its feed down.

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

use duologue_core::{ChatSession, MessageSubscription};
use duologue_infra::store::ConfiguredStore;
use duologue_types::conversation::ConversationId;
use duologue_types::error::ChatError;
use duologue_types::message::{ChatMessage, MessageId};
use duologue_types::user::User;

use crate::http::error::AppError;
use crate::http::extractors::identity::CurrentUser;
use crate::state::AppState;

/// Incoming command from a WebSocket client.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsCommand {
    /// Switch to the conversation with this email or username.
    SelectPartner { identifier: String },
    /// Send a message to the active conversation.
    Send { text: String },
    /// Keep-alive ping. Server responds with `{"type":"pong"}`.
    Ping,
}

/// Outgoing frame to a WebSocket client.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    ConversationSelected {
        conversation_id: ConversationId,
        partner: User,
    },
    Message {
        message: ChatMessage,
    },
    Sent {
        message_id: MessageId,
    },
    Error {
        code: String,
        message: String,
    },
    Pong,
}

impl From<&ChatError> for ServerFrame {
    fn from(e: &ChatError) -> Self {
        ServerFrame::Error {
            code: e.code().to_string(),
            message: e.to_string(),
        }
    }
}

type WsSession = ChatSession<ConfiguredStore>;

/// Upgrade an HTTP request to a chat WebSocket for the calling user.
///
/// This is mounted at `/ws/chat` in the router.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<impl IntoResponse, AppError> {
    let session = state.services.session(&current)?;
    Ok(ws.on_upgrade(move |socket| handle_ws_connection(socket, session)))
}

/// Core WebSocket connection handler.
///
/// Uses `tokio::select!` to multiplex between the live message feed and
/// incoming WebSocket frames in a single task.
async fn handle_ws_connection(socket: WebSocket, mut session: WsSession) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut feed: Option<MessageSubscription> = None;

    tracing::debug!(user_id = %session.user_id(), "chat WebSocket connected");

    loop {
        let frames = tokio::select! {
            // --- Branch 1: Forward messages of the active conversation ---
            item = next_message(&mut feed) => match item {
                Some(Ok(message)) => vec![ServerFrame::Message { message }],
                Some(Err(e)) => {
                    feed = None;
                    vec![ServerFrame::from(&e)]
                }
                None => {
                    feed = None;
                    Vec::new()
                }
            },

            // --- Branch 2: Process commands from the client ---
            msg_result = ws_receiver.next() => match msg_result {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<WsCommand>(text.as_str()) {
                        Ok(command) => handle_command(&mut session, &mut feed, command).await,
                        Err(err) => {
                            tracing::warn!(raw = %text.as_str(), error = %err, "Ignoring malformed WebSocket command");
                            vec![ServerFrame::Error {
                                code: "INVALID_COMMAND".to_string(),
                                message: err.to_string(),
                            }]
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    tracing::debug!("WebSocket receive error: {err}");
                    break;
                }
                // Ignore binary, ping, pong protocol frames (handled by axum/tungstenite)
                Some(Ok(_)) => Vec::new(),
            },
        };

        if send_frames(&mut ws_sender, frames).await.is_err() {
            // Client disconnected
            break;
        }
    }

    session.close();
    tracing::debug!(user_id = %session.user_id(), "chat WebSocket closed");
}

/// Apply one client command to the session and return the frames to send.
pub async fn handle_command(
    session: &mut WsSession,
    feed: &mut Option<MessageSubscription>,
    command: WsCommand,
) -> Vec<ServerFrame> {
    match command {
        WsCommand::SelectPartner { identifier } => {
            // The previous feed is torn down by the session before resolving.
            *feed = None;
            match session.select_partner(&identifier).await {
                Ok(subscription) => {
                    let conversation_id = subscription.conversation_id().clone();
                    *feed = Some(subscription);
                    match session.partner() {
                        Some(partner) => vec![ServerFrame::ConversationSelected {
                            conversation_id,
                            partner: partner.clone(),
                        }],
                        None => Vec::new(),
                    }
                }
                Err(e) => vec![ServerFrame::from(&e)],
            }
        }
        WsCommand::Send { text } => match session.send(&text).await {
            Ok(message_id) => vec![ServerFrame::Sent { message_id }],
            Err(e) => vec![ServerFrame::from(&e)],
        },
        WsCommand::Ping => vec![ServerFrame::Pong],
    }
}

async fn next_message(
    feed: &mut Option<MessageSubscription>,
) -> Option<Result<ChatMessage, ChatError>> {
    match feed {
        Some(subscription) => subscription.next().await,
        None => std::future::pending().await,
    }
}

async fn send_frames(
    ws_sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    frames: Vec<ServerFrame>,
) -> Result<(), axum::Error> {
    for frame in frames {
        match serde_json::to_string(&frame) {
            Ok(json) => ws_sender.send(Message::Text(json.into())).await?,
            Err(err) => tracing::warn!("Failed to serialize ServerFrame: {err}"),
        }
    }
    Ok(())
}
