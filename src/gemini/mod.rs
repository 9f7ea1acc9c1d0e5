//! Gemini image generation
//!
//! Provides:
//! - `ImageGenerator`, the seam the edit pipeline drives
//! - `GeminiClient`, a streaming `streamGenerateContent` client over SSE
//!
//! A generation call yields a finite, one-shot stream of chunks. Each chunk
//! carries at most one text fragment and any number of inline images.

mod sse;
mod wire;

use std::fmt::Display;
use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use sse::SseDecoder;
pub use wire::{MAX_OUTPUT_TOKENS, TEMPERATURE, TOP_P};

use wire::{GenerateContentRequest, GenerateContentResponse};

/// Generation errors
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Gemini API key not configured")]
    NotConfigured,

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error: {status} - {body}")]
    Api { status: u16, body: String },

    #[error("stream error: {0}")]
    Stream(String),

    #[error("malformed response: {0}")]
    Decode(String),
}

/// Input for one generation call
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub image: Vec<u8>,
    pub mime_type: String,
    pub prompt: String,
    pub aspect_ratio: Option<String>,
}

/// Binary part of a chunk
#[derive(Debug, Clone, PartialEq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// One increment of streamed output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub text: Option<String>,
    pub images: Vec<InlineImage>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<Chunk, GenerationError>> + Send>>;

/// External multimodal generation call
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Start a streaming generation; the returned stream is consumed once
    async fn generate_stream(&self, request: GenerateRequest)
        -> Result<ChunkStream, GenerationError>;

    fn is_configured(&self) -> bool {
        true
    }
}

/// Gemini client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.5-flash-image-preview".to_string(),
        }
    }
}

/// Gemini API client
#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    /// Create a new Gemini client
    ///
    /// Only a connect timeout is set; the stream itself runs as long as the
    /// server keeps it open.
    pub fn new(config: GeminiConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    fn stream_url(&self) -> String {
        format!(
            "{}/models/{}:streamGenerateContent",
            self.config.api_url.trim_end_matches('/'),
            self.config.model
        )
    }
}

#[async_trait]
impl ImageGenerator for GeminiClient {
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ChunkStream, GenerationError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or(GenerationError::NotConfigured)?;

        let body = GenerateContentRequest::new(&request);

        debug!(
            "Sending streaming generation request to {} ({} byte image)",
            self.config.model,
            request.image.len()
        );

        let response = self
            .client
            .post(self.stream_url())
            .query(&[("alt", "sse")])
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Gemini API error: {} - {}", status, body);
            return Err(GenerationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_chunks(response.bytes_stream()))
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

/// Turn a raw SSE byte stream into a stream of chunks
pub fn decode_chunks<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    Box::pin(async_stream::try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = SseDecoder::new();

        while let Some(piece) = bytes.next().await {
            let piece = piece
                .map_err(|e| GenerationError::Stream(format!("response body read: {}", e)))?;
            for payload in decoder.push(piece.as_ref()) {
                yield parse_chunk(&payload)?;
            }
        }

        if let Some(payload) = decoder.finish() {
            yield parse_chunk(&payload)?;
        }
    })
}

fn parse_chunk(payload: &str) -> Result<Chunk, GenerationError> {
    let response: GenerateContentResponse = serde_json::from_str(payload)
        .map_err(|e| GenerationError::Decode(format!("chunk JSON: {}", e)))?;
    response.into_chunk()
}
