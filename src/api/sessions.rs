//! Session API endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use super::{error_response, AppState};
use crate::sessions::{SessionError, SessionUpdate};

/// Build sessions router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/{id}", get(get_session).put(update_session))
}

/// Update request
///
/// `metadata` is normally a JSON-encoded string (form clients); an inline
/// JSON value is accepted too and validated the same way.
#[derive(Debug, Deserialize)]
pub struct UpdateSessionRequest {
    pub history: Option<Vec<String>>,
    pub metadata: Option<Value>,
}

impl From<UpdateSessionRequest> for SessionUpdate {
    fn from(req: UpdateSessionRequest) -> Self {
        Self {
            history: req.history,
            metadata: req.metadata.map(|value| match value {
                Value::String(raw) => raw,
                other => other.to_string(),
            }),
        }
    }
}

fn session_error_response(e: SessionError) -> axum::response::Response {
    match e {
        SessionError::NotFound(id) => {
            error_response(StatusCode::NOT_FOUND, format!("session not found: {}", id))
        }
        SessionError::InvalidMetadata(_) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        e => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// Create a new session
async fn create_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.create().await {
        Ok(session) => (StatusCode::CREATED, Json(session)).into_response(),
        Err(e) => session_error_response(e),
    }
}

/// Get a session by id
async fn get_session(Path(id): Path<String>, State(state): State<AppState>) -> impl IntoResponse {
    match state.sessions.get(&id).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => session_error_response(e),
    }
}

/// Replace a session's history and/or metadata
async fn update_session(
    Path(id): Path<String>,
    State(state): State<AppState>,
    Json(req): Json<UpdateSessionRequest>,
) -> impl IntoResponse {
    match state.sessions.update(&id, req.into()).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(e) => session_error_response(e),
    }
}
