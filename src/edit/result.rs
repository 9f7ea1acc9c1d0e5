//! Outcome of one edit call

use serde::{Deserialize, Serialize};

/// Message returned when a stream finishes without any image
pub const NO_IMAGE_MESSAGE: &str = "No image was generated";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// Result handed back to the caller verbatim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub status: Status,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub image_urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerationResult {
    pub fn success(image_urls: Vec<String>, text: Option<String>) -> Self {
        Self {
            status: Status::Success,
            image_urls,
            text,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>, text: Option<String>) -> Self {
        Self {
            status: Status::Error,
            image_urls: Vec::new(),
            text,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_serialization() {
        let result = GenerationResult::success(vec!["http://x/images/a.jpg".into()], None);
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "success", "image_urls": ["http://x/images/a.jpg"]})
        );
    }

    #[test]
    fn test_error_serialization() {
        let result = GenerationResult::error(NO_IMAGE_MESSAGE, Some("sorry".into()));
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"status": "error", "text": "sorry", "message": NO_IMAGE_MESSAGE})
        );
        assert!(!result.is_success());
    }
}
