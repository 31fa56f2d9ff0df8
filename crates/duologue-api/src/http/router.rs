//! Axum router configuration with middleware.
//!
//! All REST routes are under `/api/v1/`; the chat WebSocket lives at
//! `/ws/chat`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Directory
        .route("/users", post(handlers::users::register_user))
        .route("/users/{identifier}", get(handlers::users::get_user))
        // Conversations
        .route(
            "/conversations",
            get(handlers::conversations::list_conversations)
                .post(handlers::conversations::open_conversation),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::conversations::list_messages)
                .post(handlers::conversations::send_message),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes)
        .route("/ws/chat", get(handlers::ws::ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no identity required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::http::extractors::identity::USER_HEADER;

    async fn call(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, user: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::post(uri).header("content-type", "application/json");
        if let Some(user) = user {
            builder = builder.header(USER_HEADER, user);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get_as(uri: &str, user: &str) -> Request<Body> {
        Request::get(uri)
            .header(USER_HEADER, user)
            .body(Body::empty())
            .unwrap()
    }

    async fn seeded_router() -> Router {
        let router = build_router(AppState::in_memory());
        for (id, email, username) in [("u1", "alice@x.com", "alice"), ("u2", "bob@x.com", "bob")] {
            let (status, _) = call(
                &router,
                post_json(
                    "/api/v1/users",
                    None,
                    json!({"id": id, "email": email, "username": username}),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        router
    }

    #[tokio::test]
    async fn test_health() {
        let router = build_router(AppState::in_memory());
        let (status, body) = call(&router, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_open_send_and_read_back() {
        let router = seeded_router().await;

        let (status, body) = call(
            &router,
            post_json("/api/v1/conversations", Some("u1"), json!({"partner": "bob"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let conversation_id = body["data"]["id"].as_str().unwrap().to_string();
        assert_eq!(body["data"]["partner"], "u2");

        // Opening from the other side lands on the same conversation.
        let (_, body) = call(
            &router,
            post_json("/api/v1/conversations", Some("u2"), json!({"partner": "alice@x.com"})),
        )
        .await;
        assert_eq!(body["data"]["id"], conversation_id.as_str());

        let uri = format!("/api/v1/conversations/{conversation_id}/messages");
        let (status, _) = call(&router, post_json(&uri, Some("u1"), json!({"body": "hi bob"}))).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) = call(&router, get_as(&uri, "u2")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["body"], "hi bob");
        assert_eq!(body["data"][0]["sender_id"], "u1");

        let (_, body) = call(&router, get_as("/api/v1/conversations", "u1")).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_caller_is_unauthorized() {
        let router = seeded_router().await;
        let (status, body) = call(&router, get_as("/api/v1/conversations", "ghost")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(!body["errors"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_partner_is_not_found() {
        let router = seeded_router().await;
        let (status, body) = call(
            &router,
            post_json("/api/v1/conversations", Some("u1"), json!({"partner": "notreal@example.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["errors"][0]["code"], "PARTNER_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_outsider_cannot_read_messages() {
        let router = seeded_router().await;
        call(
            &router,
            post_json(
                "/api/v1/users",
                None,
                json!({"id": "u3", "email": "carol@x.com", "username": "carol"}),
            ),
        )
        .await;
        let (_, body) = call(
            &router,
            post_json("/api/v1/conversations", Some("u1"), json!({"partner": "bob"})),
        )
        .await;
        let uri = format!("/api/v1/conversations/{}/messages", body["data"]["id"].as_str().unwrap());

        let (status, body) = call(&router, get_as(&uri, "u3")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["errors"][0]["code"], "NOT_PARTICIPANT");

        let (status, _) = call(&router, post_json(&uri, Some("u3"), json!({"body": "psst"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let router = seeded_router().await;
        let (_, body) = call(
            &router,
            post_json("/api/v1/conversations", Some("u1"), json!({"partner": "bob"})),
        )
        .await;
        let uri = format!("/api/v1/conversations/{}/messages", body["data"]["id"].as_str().unwrap());

        let (status, body) = call(&router, post_json(&uri, Some("u1"), json!({"body": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "EMPTY_MESSAGE");
    }
}
