//! HTTP API for ResumeChat
//!
//! ## Endpoint Map
//!
//! | Method | Path                          | Description                      |
//! |--------|-------------------------------|----------------------------------|
//! | GET    | `/health`                     | Liveness probe                   |
//! | POST   | `/api/v1/sessions/:id/turns`  | Handle one turn, returns result  |
//! | GET    | `/api/v1/sessions/:id`        | Memory, turn count, token totals |
//! | DELETE | `/api/v1/sessions/:id`        | Reset the session's memory       |

use crate::error::Error;
use crate::session::Orchestrator;
use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the complete HTTP application
pub fn build_app(orchestrator: Arc<Orchestrator>, cors_origins: &[String]) -> Router {
    let state = AppState { orchestrator };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/sessions/:id/turns", post(post_turn))
        .route(
            "/api/v1/sessions/:id",
            get(get_session).delete(reset_session),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(build_cors(cors_origins))
}

// =============================================================================
// Types
// =============================================================================

/// Request body of a turn
#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub text: String,
}

/// API error envelope
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

/// API error detail
#[derive(Debug, Serialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }
}

fn error_response(err: Error) -> Response {
    match err {
        Error::Session(message) => {
            (StatusCode::BAD_REQUEST, Json(ApiError::bad_request(message))).into_response()
        }
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal(other.to_string())),
        )
            .into_response(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/v1/sessions/:id/turns
async fn post_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<TurnRequest>,
) -> Response {
    match state.orchestrator.handle_turn(&request.text, &id).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/sessions/:id
async fn get_session(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.orchestrator.session_snapshot(&id).await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiError::not_found(format!("Session '{}' not found", id))),
        )
            .into_response(),
    }
}

/// DELETE /api/v1/sessions/:id
///
/// Idempotent: resetting an unknown session is not an error.
async fn reset_session(State(state): State<AppState>, Path(id): Path<String>) -> StatusCode {
    state.orchestrator.reset_session(&id).await;
    StatusCode::NO_CONTENT
}

// =============================================================================
// CORS
// =============================================================================

fn build_cors(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT]);

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        cors.allow_origin(parsed)
    }
}
