//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use duologue_types::error::ChatError;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Chat core errors, reported under their own code.
    Chat(ChatError),
    /// Missing or unknown caller identity.
    Unauthorized(String),
    /// Resource not found.
    NotFound(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

/// HTTP status for a chat error kind.
pub fn chat_status(error: &ChatError) -> StatusCode {
    match error {
        ChatError::InvalidPartner(_) | ChatError::EmptyMessage | ChatError::InvalidUser(_) => {
            StatusCode::BAD_REQUEST
        }
        ChatError::PartnerNotFound(_) | ChatError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        ChatError::NoActiveConversation => StatusCode::CONFLICT,
        ChatError::NotParticipant { .. } => StatusCode::FORBIDDEN,
        ChatError::NotSignedIn => StatusCode::UNAUTHORIZED,
        ChatError::LookupFailed(_)
        | ChatError::SubscriptionError(_)
        | ChatError::StoreWriteFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(e) => (chat_status(e), e.code(), e.to_string()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use duologue_types::conversation::ConversationId;
    use duologue_types::error::StoreError;
    use duologue_types::user::UserId;

    #[test]
    fn test_chat_errors_map_to_distinct_statuses() {
        assert_eq!(chat_status(&ChatError::EmptyMessage), StatusCode::BAD_REQUEST);
        assert_eq!(
            chat_status(&ChatError::PartnerNotFound("x".into())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(chat_status(&ChatError::NoActiveConversation), StatusCode::CONFLICT);
        assert_eq!(
            chat_status(&ChatError::NotParticipant {
                user: UserId::from("u3"),
                conversation: ConversationId::from("c1"),
            }),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            chat_status(&ChatError::StoreWriteFailed(StoreError::Write("disk full".into()))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_into_response_uses_chat_status() {
        let response = AppError::from(ChatError::ConversationNotFound(ConversationId::from("c9")))
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::Unauthorized("no user".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
