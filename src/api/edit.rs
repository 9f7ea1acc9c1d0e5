//! Upload and edit endpoints
//!
//! POST /api/upload          - store an upload under `input/`
//! POST /api/edit            - upload + edit in one request (multipart)
//! POST /api/edit-from-path  - edit a previously uploaded image (form)

use std::path::Path;

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::{error_response, AppState};
use crate::edit::{EditRequest, GenerationResult, ImageSource};
use crate::storage::{content_type_for, Folder, StorageError};

/// Build the edit router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/edit", post(edit_image))
        .route("/api/edit-from-path", post(edit_from_path))
}

/// File part of a multipart request
#[derive(Debug)]
struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    data: Vec<u8>,
}

/// Fields accepted by the multipart endpoints
#[derive(Debug, Default)]
struct EditForm {
    file: Option<UploadedFile>,
    prompt: Option<String>,
    session_id: Option<String>,
    aspect_ratio: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_form(mut multipart: Multipart) -> Result<EditForm, MultipartError> {
    let mut form = EditForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await?.to_vec();
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    data,
                });
            }
            Some("prompt") => form.prompt = Some(field.text().await?),
            Some("session_id") => form.session_id = non_empty(field.text().await?),
            Some("aspect_ratio") => form.aspect_ratio = non_empty(field.text().await?),
            _ => {}
        }
    }

    Ok(form)
}

/// `{uuid}.{ext}`, keeping a short alphanumeric extension from the client name
fn input_filename(original: Option<&str>) -> String {
    let extension = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "jpg".to_string());

    format!("{}.{}", Uuid::new_v4(), extension)
}

/// Upload response
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    /// Handle to pass back to `/api/edit-from-path`
    pub file_path: String,
    pub filename: String,
    pub url: String,
}

/// Store an uploaded image under `input/`
async fn upload_image(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let Some(file) = form.file else {
        return error_response(StatusCode::BAD_REQUEST, "file is required");
    };

    let filename = input_filename(file.filename.as_deref());
    match state.artifacts.save(&file.data, &filename, Folder::Input).await {
        Ok(url) => (
            StatusCode::OK,
            Json(UploadResponse {
                status: "success",
                file_path: filename.clone(),
                filename,
                url,
            }),
        )
            .into_response(),
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Upload failed: {}", e),
        ),
    }
}

/// Upload an image and edit it in one request
async fn edit_image(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(e) => return error_response(StatusCode::BAD_REQUEST, e.body_text()),
    };
    let (Some(file), Some(prompt)) = (form.file, form.prompt) else {
        return error_response(StatusCode::BAD_REQUEST, "file and prompt are required");
    };

    let filename = input_filename(file.filename.as_deref());
    if let Err(e) = state.artifacts.save(&file.data, &filename, Folder::Input).await {
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Upload failed: {}", e),
        );
    }

    let mime_type = file
        .content_type
        .filter(|ct| ct.starts_with("image/"))
        .unwrap_or_else(|| content_type_for(&filename).to_string());

    let result = state
        .pipeline
        .run(EditRequest {
            source: ImageSource::Bytes {
                data: file.data,
                mime_type,
            },
            prompt,
            session_id: form.session_id,
            aspect_ratio: form.aspect_ratio,
        })
        .await;

    Json(result).into_response()
}

/// Edit-from-path form
#[derive(Debug, Deserialize)]
pub struct EditFromPathForm {
    pub file_path: String,
    pub prompt: String,
    pub session_id: Option<String>,
    pub aspect_ratio: Option<String>,
}

/// Edit an image previously stored under `input/`
///
/// Only the final path component of `file_path` is used.
async fn edit_from_path(
    State(state): State<AppState>,
    Form(form): Form<EditFromPathForm>,
) -> Response {
    let not_found = || {
        Json(GenerationResult::error(
            format!("Image not found: {}", form.file_path),
            None,
        ))
        .into_response()
    };

    let Some(filename) = Path::new(&form.file_path)
        .file_name()
        .and_then(|name| name.to_str())
    else {
        return not_found();
    };

    let data = match state.artifacts.load(filename, Folder::Input).await {
        Ok(data) => data,
        Err(StorageError::NotFound { .. }) | Err(StorageError::InvalidKey(_)) => {
            return not_found();
        }
        Err(e) => {
            warn!("Failed to load input {}: {}", filename, e);
            return Json(GenerationResult::error(
                format!("Failed to read image {}: {}", form.file_path, e),
                None,
            ))
            .into_response();
        }
    };

    let result = state
        .pipeline
        .run(EditRequest {
            source: ImageSource::Bytes {
                data,
                mime_type: content_type_for(filename).to_string(),
            },
            prompt: form.prompt.clone(),
            session_id: form.session_id.clone().and_then(non_empty),
            aspect_ratio: form.aspect_ratio.clone().and_then(non_empty),
        })
        .await;

    Json(result).into_response()
}
