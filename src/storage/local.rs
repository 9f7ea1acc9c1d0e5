//! Local filesystem backend

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{Folder, StorageError};

/// Files under `{root}/{folder}/{filename}`, served at `{base_url}/{route}/{filename}`
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    base_url: String,
}

impl LocalStore {
    /// Create a local store rooted at `root`
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create the folder layout if missing
    pub async fn ensure_layout(&self) -> Result<(), StorageError> {
        for folder in Folder::ALL {
            tokio::fs::create_dir_all(self.root.join(folder.as_str())).await?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, folder: Folder, filename: &str) -> PathBuf {
        self.root.join(folder.as_str()).join(filename)
    }

    /// Public URL for a locally stored file
    pub fn locator(&self, folder: Folder, filename: &str) -> String {
        format!("{}/{}/{}", self.base_url, folder.route(), filename)
    }

    /// Write a file, returning its locator
    pub async fn write(
        &self,
        folder: Folder,
        filename: &str,
        data: &[u8],
    ) -> Result<String, StorageError> {
        let path = self.path_for(folder, filename);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;

        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(self.locator(folder, filename))
    }

    /// Read a file; `Ok(None)` if it does not exist
    pub async fn read(
        &self,
        folder: Folder,
        filename: &str,
    ) -> Result<Option<Vec<u8>>, StorageError> {
        match tokio::fs::read(self.path_for(folder, filename)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
