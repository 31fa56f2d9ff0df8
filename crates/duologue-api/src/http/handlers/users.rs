//! User directory handlers for the REST API.

use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;

use duologue_types::error::ChatError;
use duologue_types::user::{NewUser, User, UserId};

use crate::http::error::AppError;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /api/v1/users`.
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    /// Stable id from the identity provider. Generated when omitted.
    pub id: Option<String>,
    pub email: String,
    pub username: String,
}

/// POST /api/v1/users - Register a user profile.
pub async fn register_user(
    State(state): State<AppState>,
    Json(body): Json<RegisterUserRequest>,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();

    let mut new_user = NewUser::new(body.email, body.username);
    if let Some(id) = body.id {
        new_user.id = UserId::from(id);
    }
    let user = state.services.directory().register(new_user).await?;

    let href = format!("/api/v1/users/{}", user.id);
    Ok(timer.respond(user).with_link("self", &href).created())
}

/// GET /api/v1/users/{identifier} - Find a user by email, username or id.
pub async fn get_user(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<ApiResponse<User>, AppError> {
    let timer = RequestTimer::start();
    let directory = state.services.directory();

    let user = match directory.lookup(&identifier).await {
        Ok(user) => user,
        Err(ChatError::PartnerNotFound(_)) => directory
            .get(&UserId::from(identifier.as_str()))
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No user matches '{identifier}'")))?,
        Err(e) => return Err(e.into()),
    };

    Ok(timer.respond(user))
}
