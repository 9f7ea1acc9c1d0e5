//! Artifact serving endpoints
//!
//! GET /images/{name} - generated results
//! GET /input/{name}  - uploaded sources
//! GET /json/{name}   - session snapshots

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

use super::AppState;
use crate::storage::{content_type_for, Folder, StorageError};

/// Build the artifacts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/images/{name}", get(get_result))
        .route("/input/{name}", get(get_input))
        .route("/json/{name}", get(get_snapshot))
}

async fn get_result(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    serve(&state, &name, Folder::Result).await
}

async fn get_input(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    serve(&state, &name, Folder::Input).await
}

async fn get_snapshot(Path(name): Path<String>, State(state): State<AppState>) -> Response {
    serve(&state, &name, Folder::Json).await
}

/// Serve an artifact through the artifact store (remote first, then local)
async fn serve(state: &AppState, name: &str, folder: Folder) -> Response {
    match state.artifacts.load(name, folder).await {
        Ok(data) => {
            // Images are write-once; snapshots change on every update
            let cache_control = match folder {
                Folder::Json => "no-cache",
                _ => "public, max-age=31536000, immutable",
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type_for(name)),
                    (header::CACHE_CONTROL, cache_control),
                ],
                data,
            )
                .into_response()
        }
        Err(StorageError::NotFound { .. }) | Err(StorageError::InvalidKey(_)) => {
            (StatusCode::NOT_FOUND, "Artifact not found").into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response(),
    }
}
