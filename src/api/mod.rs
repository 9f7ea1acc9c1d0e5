//! HTTP API module - edit, session and artifact endpoints

mod edit;
mod images;
mod sessions;

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::edit::EditPipeline;
use crate::gemini::ImageGenerator;
use crate::sessions::SessionStore;
use crate::storage::ArtifactStore;

/// Largest accepted request body (image uploads)
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub artifacts: Arc<ArtifactStore>,
    pub sessions: Arc<SessionStore>,
    pub pipeline: Arc<EditPipeline>,
    pub generator: Arc<dyn ImageGenerator>,
}

/// Build the API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .merge(edit::router())
        .merge(sessions::router())
        .merge(images::router())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "editd",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        api_key_set: state.generator.is_configured(),
        remote_storage: state.artifacts.has_remote(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    api_key_set: bool,
    remote_storage: bool,
}
