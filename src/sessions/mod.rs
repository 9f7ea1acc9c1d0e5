//! Edit sessions
//!
//! A session is a workspace that accumulates the locators of every image
//! generated against it, plus free-form client metadata. Snapshots are
//! stored as JSON in the artifact store's `json` folder.

mod cache;
mod store;

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use crate::storage::StorageError;

pub use cache::SessionCache;
pub use store::SessionStore;

static SESSION_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sess_[0-9a-f]{12}$").unwrap());

/// Session errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Session snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Artifact locators in the order they were produced
    #[serde(default)]
    pub history: Vec<String>,
    #[serde(default)]
    pub metadata: Vec<Value>,
}

impl Session {
    /// A fresh, empty session
    pub fn new(id: String) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            updated_at: None,
            history: Vec::new(),
            metadata: Vec::new(),
        }
    }

    /// Decode a stored snapshot, defaulting anything missing or malformed.
    ///
    /// The id is always the key the snapshot was stored under.
    pub fn from_snapshot(id: &str, snapshot: &Value) -> Self {
        let created_at = match snapshot.get("created_at").and_then(Value::as_str) {
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                warn!("Session {} has malformed created_at {:?}", id, raw);
                Utc::now()
            }),
            None => {
                warn!("Session {} has no created_at", id);
                Utc::now()
            }
        };

        let updated_at = snapshot
            .get("updated_at")
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        let history = snapshot
            .get("history")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        let metadata = snapshot
            .get("metadata")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Self {
            id: id.to_string(),
            created_at,
            updated_at,
            history,
            metadata,
        }
    }
}

/// Replacement fields for `SessionStore::update`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionUpdate {
    pub history: Option<Vec<String>>,
    /// Raw JSON text; must be an array
    pub metadata: Option<String>,
}

/// Generate a new session id: `sess_` + 12 lowercase hex chars
pub fn generate_session_id() -> String {
    let random_bytes: [u8; 6] = rand::rng().random();
    format!("sess_{}", hex::encode(random_bytes))
}

pub fn is_valid_session_id(id: &str) -> bool {
    SESSION_ID_REGEX.is_match(id)
}

/// Parse client-supplied metadata; only a JSON array is accepted
pub fn parse_metadata(raw: &str) -> Result<Vec<Value>, SessionError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(SessionError::InvalidMetadata(
            "metadata must be a JSON array".to_string(),
        )),
        Err(e) => Err(SessionError::InvalidMetadata(e.to_string())),
    }
}

/// RFC 3339, or a naive ISO-8601 timestamp taken as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}
