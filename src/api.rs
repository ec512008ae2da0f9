//! REST API server for the banking chat orchestrator
//!
//! Channel adapters deliver `(session_id, text)` here and relay the reply.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::agent::Orchestrator;
use crate::models::SessionId;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MessageRequest {
    /// `<channel>:<user>`; takes precedence over `channel`/`user_id`
    pub session_id: Option<String>,
    pub channel: Option<String>,
    pub user_id: Option<String>,
    pub text: String,
}

impl MessageRequest {
    fn session_id(&self) -> Option<SessionId> {
        if let Some(id) = self.session_id.as_deref().filter(|v| !v.trim().is_empty()) {
            return Some(SessionId::from(id));
        }
        let user = self.user_id.as_deref().filter(|v| !v.trim().is_empty())?;
        let channel = self.channel.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or("api");
        Some(SessionId::new(channel, user))
    }
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<Orchestrator>,
}

/// =============================
/// Health Endpoint
/// =============================

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// =============================
/// Message Endpoint
/// =============================

async fn message_handler(
    State(state): State<ApiState>,
    Json(req): Json<MessageRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    let Some(session_id) = req.session_id() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("session_id or user_id is required".into())),
        );
    };
    if req.text.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("text must not be empty".into())),
        );
    }

    info!(session_id = %session_id, "Received message");
    let response = state.orchestrator.handle_message(&session_id, &req.text).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(serde_json::json!({
            "session_id": session_id,
            "reply": response.text,
            "kind": response.kind,
            "intent": response.intent,
        }))),
    )
}

/// =============================
/// Router
/// =============================

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let state = ApiState { orchestrator };

    Router::new()
        .route("/health", axum::routing::get(health))
        .route("/api/message", post(message_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    orchestrator: Arc<Orchestrator>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(orchestrator);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::banking::SandboxBank;
    use crate::config::AgentConfig;
    use crate::memory::InMemoryPatternStore;
    use crate::state::InMemorySessionStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn router() -> Router {
        let orchestrator = Orchestrator::new(
            Arc::new(SandboxBank::demo()),
            Arc::new(InMemorySessionStore::default()),
            Arc::new(InMemoryPatternStore::new()),
            &AgentConfig::default(),
        );
        create_router(Arc::new(orchestrator))
    }

    async fn post_message(router: Router, body: serde_json::Value) -> (StatusCode, ApiResponse) {
        let request = Request::builder()
            .method("POST")
            .uri("/api/message")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_message_round_trip() {
        let (status, body) = post_message(
            router(),
            serde_json::json!({"session_id": "web:alice", "text": "what's my balance"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.success);
        let data = body.data.unwrap();
        assert_eq!(data["session_id"], "web:alice");
        assert_eq!(data["kind"], "info");
        assert_eq!(data["intent"], "balance_check");
        assert!(data["reply"].as_str().unwrap().contains("₦250,000"));
    }

    #[tokio::test]
    async fn test_session_from_channel_and_user() {
        let (status, body) = post_message(
            router(),
            serde_json::json!({"channel": "whatsapp", "user_id": "234800", "text": "help"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.data.unwrap()["session_id"], "whatsapp:234800");
    }

    #[tokio::test]
    async fn test_missing_session_is_bad_request() {
        let (status, body) = post_message(router(), serde_json::json!({"text": "hi"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.success);
    }

    #[tokio::test]
    async fn test_empty_text_is_bad_request() {
        let (status, _) =
            post_message(router(), serde_json::json!({"session_id": "web:a", "text": "  "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
