//! Gemini `generateContent` request and response bodies

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};

use super::{Chunk, GenerateRequest, GenerationError, InlineImage};

/// Fixed sampling parameters for edit requests
pub const TEMPERATURE: f32 = 1.0;
pub const TOP_P: f32 = 0.95;
pub const MAX_OUTPUT_TOKENS: u32 = 32768;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    pub fn new(request: &GenerateRequest) -> Self {
        let parts = vec![
            Part {
                inline_data: Some(Blob {
                    mime_type: request.mime_type.clone(),
                    data: BASE64.encode(&request.image),
                }),
                ..Part::default()
            },
            Part {
                text: Some(request.prompt.clone()),
                ..Part::default()
            },
        ];

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                top_p: TOP_P,
                max_output_tokens: MAX_OUTPUT_TOKENS,
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
                image_config: request.aspect_ratio.clone().map(|aspect_ratio| ImageConfig {
                    aspect_ratio,
                }),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<Blob>,
    /// Set on reasoning parts, which are not part of the answer text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blob {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_modalities: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_config: Option<ImageConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub aspect_ratio: String,
}

/// One streamed response object
#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
}

impl GenerateContentResponse {
    /// Text is taken from the first candidate (excluding thoughts); images
    /// from every inline part of every candidate, in order.
    pub fn into_chunk(self) -> Result<Chunk, GenerationError> {
        if let Some(error) = self.error {
            return Err(GenerationError::Stream(format!(
                "API error {}: {}",
                error.code, error.message
            )));
        }

        let text: String = self
            .candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter(|part| part.thought != Some(true))
                    .filter_map(|part| part.text.as_deref())
                    .collect()
            })
            .unwrap_or_default();

        let mut images = Vec::new();
        for content in self.candidates.into_iter().filter_map(|c| c.content) {
            for blob in content.parts.into_iter().filter_map(|p| p.inline_data) {
                let data = BASE64
                    .decode(blob.data.as_bytes())
                    .map_err(|e| GenerationError::Decode(format!("inline image data: {}", e)))?;
                images.push(InlineImage {
                    mime_type: blob.mime_type,
                    data,
                });
            }
        }

        Ok(Chunk {
            text: Some(text).filter(|t| !t.is_empty()),
            images,
        })
    }
}
