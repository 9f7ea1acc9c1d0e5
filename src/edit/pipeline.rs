//! Image edit pipeline
//!
//! One call drives one streaming generation to completion:
//! 1. Read the source image (fail fast if it is missing)
//! 2. Stream chunks from the generator, in arrival order
//! 3. Save each inline image to `result/` and append it to the session
//! 4. Aggregate into a `GenerationResult`
//!
//! Images are persisted and appended as they arrive, so progress made before
//! a mid-stream failure is kept.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::result::{GenerationResult, NO_IMAGE_MESSAGE};
use crate::gemini::{GenerateRequest, GenerationError, ImageGenerator};
use crate::sessions::{SessionError, SessionStore};
use crate::storage::{content_type_for, ArtifactStore, Folder, StorageError};

/// Where the source image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Local file path
    Path(PathBuf),
    /// In-memory image data
    Bytes { data: Vec<u8>, mime_type: String },
}

/// One edit instruction
#[derive(Debug, Clone)]
pub struct EditRequest {
    pub source: ImageSource,
    pub prompt: String,
    pub session_id: Option<String>,
    /// Optional aspect-ratio hint, e.g. "16:9"
    pub aspect_ratio: Option<String>,
}

#[derive(Debug, Error)]
enum EditError {
    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// What has been collected from the stream so far
#[derive(Debug, Default)]
struct EditOutput {
    image_urls: Vec<String>,
    text: Option<String>,
}

/// Orchestrates generator, artifact store and session store
pub struct EditPipeline {
    generator: Arc<dyn ImageGenerator>,
    artifacts: Arc<ArtifactStore>,
    sessions: Arc<SessionStore>,
}

impl EditPipeline {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        artifacts: Arc<ArtifactStore>,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            generator,
            artifacts,
            sessions,
        }
    }

    /// Run one edit. Never fails: every failure becomes an error result.
    pub async fn run(&self, request: EditRequest) -> GenerationResult {
        let (image, mime_type) = match read_source(request.source).await {
            Ok(source) => source,
            Err(message) => {
                warn!("{}", message);
                return GenerationResult::error(message, None);
            }
        };

        if let Some(session_id) = request.session_id.as_deref() {
            match self.sessions.get(session_id).await {
                Ok(_) => {}
                Err(SessionError::NotFound(_)) => {
                    return GenerationResult::error(
                        format!("Session not found: {}", session_id),
                        None,
                    );
                }
                Err(e) => {
                    return GenerationResult::error(
                        format!("Failed to load session {}: {}", session_id, e),
                        None,
                    );
                }
            }
        }

        info!(
            "Editing {} byte {} image (session: {})",
            image.len(),
            mime_type,
            request.session_id.as_deref().unwrap_or("none")
        );

        let generate = GenerateRequest {
            image,
            mime_type,
            prompt: request.prompt,
            aspect_ratio: request.aspect_ratio,
        };

        let mut output = EditOutput::default();
        match self
            .consume(generate, request.session_id.as_deref(), &mut output)
            .await
        {
            Ok(()) if !output.image_urls.is_empty() => {
                info!("Edit produced {} image(s)", output.image_urls.len());
                GenerationResult::success(output.image_urls, output.text)
            }
            Ok(()) => {
                warn!("Generation finished without an image");
                GenerationResult::error(NO_IMAGE_MESSAGE, output.text)
            }
            Err(e) => {
                warn!(
                    "Edit failed after {} image(s): {}",
                    output.image_urls.len(),
                    e
                );
                GenerationResult::error(format!("Processing failed: {}", e), output.text)
            }
        }
    }

    async fn consume(
        &self,
        request: GenerateRequest,
        session_id: Option<&str>,
        output: &mut EditOutput,
    ) -> Result<(), EditError> {
        let mut stream = self.generator.generate_stream(request).await?;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if let Some(fragment) = chunk.text {
                output
                    .text
                    .get_or_insert_with(String::new)
                    .push_str(&fragment);
            }

            for image in chunk.images {
                let filename = format!("{}.jpg", Uuid::new_v4());
                let locator = self
                    .artifacts
                    .save(&image.data, &filename, Folder::Result)
                    .await?;
                debug!(
                    "Saved generated {} image ({} bytes) as {}",
                    image.mime_type,
                    image.data.len(),
                    locator
                );

                if let Some(session_id) = session_id {
                    self.sessions.append_history(session_id, &locator).await?;
                }
                output.image_urls.push(locator);
            }
        }

        Ok(())
    }
}

async fn read_source(source: ImageSource) -> Result<(Vec<u8>, String), String> {
    match source {
        ImageSource::Path(path) => {
            let data = tokio::fs::read(&path).await.map_err(|e| {
                if e.kind() == ErrorKind::NotFound {
                    format!("Image not found: {}", path.display())
                } else {
                    format!("Failed to read image {}: {}", path.display(), e)
                }
            })?;
            let mime_type = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(content_type_for)
                .unwrap_or("image/jpeg");
            Ok((data, mime_type.to_string()))
        }
        ImageSource::Bytes { data, mime_type } => {
            if data.is_empty() {
                return Err("Image data is empty".to_string());
            }
            Ok((data, mime_type))
        }
    }
}
