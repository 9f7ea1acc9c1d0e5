//! Dual-backend artifact store
//!
//! Write policy:
//! - No remote configured: local only.
//! - Remote configured: remote first. On success, `result` artifacts are also
//!   mirrored to local disk. On failure the error is logged and the write
//!   falls back to local; the call fails only if local fails too.
//!
//! Read policy mirrors it: remote first if configured, then local.

use std::sync::Arc;

use tracing::{debug, warn};

use super::{content_type_for, validate_filename, Folder, LocalStore, RemoteStore, StorageError};

/// Artifact store over a local backend and an optional remote one
#[derive(Clone)]
pub struct ArtifactStore {
    local: LocalStore,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl ArtifactStore {
    /// Store that only writes to local disk
    pub fn local_only(local: LocalStore) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    /// Store that writes remote-first with local fallback
    pub fn with_remote(local: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            local,
            remote: Some(remote),
        }
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    /// Persist `data` as `folder/filename`, returning its public locator
    ///
    /// `filename` must be fresh; existing objects are overwritten.
    pub async fn save(
        &self,
        data: &[u8],
        filename: &str,
        folder: Folder,
    ) -> Result<String, StorageError> {
        validate_filename(filename)?;

        if let Some(remote) = &self.remote {
            let key = folder.key(filename);
            match remote.put(&key, data, content_type_for(filename)).await {
                Ok(locator) => {
                    if folder == Folder::Result {
                        if let Err(e) = self.local.write(folder, filename, data).await {
                            warn!("Local backup of {} failed: {}", key, e);
                        }
                    }
                    debug!("Saved {} to {}", key, remote.describe());
                    return Ok(locator);
                }
                Err(e) => {
                    warn!(
                        "Remote write of {} to {} failed, falling back to local storage: {}",
                        key,
                        remote.describe(),
                        e
                    );
                }
            }
        }

        self.local.write(folder, filename, data).await
    }

    /// Load `folder/filename`, preferring the remote backend
    ///
    /// `NotFound` means both backends answered and neither has the object. If
    /// the remote read failed and the local copy is missing, the remote error
    /// is returned instead.
    pub async fn load(&self, filename: &str, folder: Folder) -> Result<Vec<u8>, StorageError> {
        validate_filename(filename)?;

        let mut remote_error = None;
        if let Some(remote) = &self.remote {
            let key = folder.key(filename);
            match remote.get(&key).await {
                Ok(Some(data)) => return Ok(data),
                Ok(None) => debug!("{} not in {}, trying local", key, remote.describe()),
                Err(e) => {
                    warn!("Remote read of {} failed, trying local: {}", key, e);
                    remote_error = Some(e);
                }
            }
        }

        match self.local.read(folder, filename).await? {
            Some(data) => Ok(data),
            None => Err(remote_error.unwrap_or_else(|| StorageError::NotFound {
                folder,
                filename: filename.to_string(),
            })),
        }
    }
}
