//! Caller identity extractor.
//!
//! Sign-in happens outside Duologue; callers name themselves with:
//! - `X-Duologue-User: <user id>` header
//! - `?user=<user id>` query parameter (WebSocket upgrades, where browsers
//!   cannot set headers)
//!
//! The id must belong to a registered user.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use serde::Deserialize;

use duologue_core::identity::IdentityProvider;
use duologue_types::user::UserId;

use crate::http::error::AppError;
use crate::state::AppState;

/// Header carrying the caller's user id.
pub const USER_HEADER: &str = "x-duologue-user";

#[derive(Deserialize)]
struct IdentityQuery {
    user: Option<String>,
}

/// The registered user making the request.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

impl IdentityProvider for CurrentUser {
    fn current_user_id(&self) -> Option<UserId> {
        Some(self.0.clone())
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user_id = extract_user_id(parts)?;

        if !state.services.directory().exists(&user_id).await? {
            return Err(AppError::Unauthorized(format!(
                "Unknown user '{user_id}'. Register with POST /api/v1/users first."
            )));
        }
        Ok(CurrentUser(user_id))
    }
}

/// Extract the caller's user id from headers or the query string.
fn extract_user_id(parts: &Parts) -> Result<UserId, AppError> {
    if let Some(value) = parts.headers.get(USER_HEADER) {
        let id = value.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid X-Duologue-User header encoding".to_string())
        })?;
        if !id.trim().is_empty() {
            return Ok(UserId::from(id.trim()));
        }
    }

    if let Ok(Query(IdentityQuery { user: Some(id) })) = Query::try_from_uri(&parts.uri)
        && !id.trim().is_empty()
    {
        return Ok(UserId::from(id.trim()));
    }

    Err(AppError::Unauthorized(
        "Missing caller identity. Provide it via the 'X-Duologue-User' header or '?user=' query parameter.".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_header_takes_precedence() {
        let p = parts(
            Request::builder()
                .uri("/ws/chat?user=u2")
                .header(USER_HEADER, " u1 ")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract_user_id(&p).unwrap(), UserId::from("u1"));
    }

    #[test]
    fn test_query_parameter_fallback() {
        let p = parts(Request::builder().uri("/ws/chat?x=1&user=u%202").body(()).unwrap());
        assert_eq!(extract_user_id(&p).unwrap(), UserId::from("u 2"));
    }

    #[test]
    fn test_missing_identity_is_unauthorized() {
        let p = parts(Request::builder().uri("/api/v1/conversations").body(()).unwrap());
        assert!(matches!(extract_user_id(&p), Err(AppError::Unauthorized(_))));
    }
}
