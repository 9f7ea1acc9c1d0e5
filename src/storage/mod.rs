//! Artifact storage
//!
//! Provides:
//! - Local filesystem backend rooted at the data directory
//! - Optional remote object-store backend (Google Cloud Storage)
//! - `ArtifactStore`, which writes remote-first with local fallback
//!
//! Both backends mirror the same three-folder layout: `input/`, `result/`, `json/`.

mod gcs;
mod local;
mod store;

use std::fmt;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gcs::{GcsStore, RemoteConfig};
pub use local::LocalStore;
pub use store::ArtifactStore;

/// Logical folder an artifact lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Folder {
    /// Uploaded source images
    Input,
    /// Generated output images
    Result,
    /// Session snapshots
    Json,
}

impl Folder {
    pub const ALL: [Folder; 3] = [Folder::Input, Folder::Result, Folder::Json];

    /// Directory / key prefix name
    pub fn as_str(&self) -> &'static str {
        match self {
            Folder::Input => "input",
            Folder::Result => "result",
            Folder::Json => "json",
        }
    }

    /// Path segment under which the local backend serves this folder
    pub fn route(&self) -> &'static str {
        match self {
            Folder::Input => "input",
            Folder::Result => "images",
            Folder::Json => "json",
        }
    }

    /// Object key for a file in this folder
    pub fn key(&self, filename: &str) -> String {
        format!("{}/{}", self.as_str(), filename)
    }
}

impl fmt::Display for Folder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("artifact not found: {folder}/{filename}")]
    NotFound { folder: Folder, filename: String },

    #[error("invalid artifact name: {0:?}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote storage error: {0}")]
    Remote(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Remote object-store backend
///
/// Keys are `{folder}/{filename}`. `put` returns the public URL of the object.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn put(&self, key: &str, data: &[u8], content_type: &str)
        -> Result<String, StorageError>;

    /// `Ok(None)` when the object does not exist
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Human-readable backend name for logs
    fn describe(&self) -> String;
}

/// Single path component: alphanumeric start, then alphanumerics, dots, dashes, underscores
static FILENAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]{0,254}$").unwrap());

/// Reject names that could escape the folder or are not plain file names
pub fn validate_filename(filename: &str) -> Result<(), StorageError> {
    if FILENAME_REGEX.is_match(filename) && !filename.contains("..") {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(filename.to_string()))
    }
}

/// Content type inferred from the file extension
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("json") => "application/json",
        _ => "image/jpeg",
    }
}
