//! Session persistence and CRUD operations
//!
//! `update` and `append_history` are plain read-modify-write cycles over the
//! full snapshot. Two concurrent appends to the same session can race and the
//! later write may drop the earlier entry.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use super::{
    generate_session_id, is_valid_session_id, parse_metadata, Session, SessionCache,
    SessionError, SessionUpdate,
};
use crate::storage::{ArtifactStore, Folder, StorageError};

/// Session storage backed by the artifact store's `json` folder
pub struct SessionStore {
    artifacts: Arc<ArtifactStore>,
    cache: SessionCache,
}

impl SessionStore {
    /// Create a new session store
    pub fn new(artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            artifacts,
            cache: SessionCache::new(),
        }
    }

    fn snapshot_name(id: &str) -> String {
        format!("{}.json", id)
    }

    /// Create and persist an empty session
    pub async fn create(&self) -> Result<Session, SessionError> {
        let mut id = generate_session_id();
        while self.lookup(&id).await?.is_some() {
            id = generate_session_id();
        }

        let session = Session::new(id);
        self.persist(&session).await?;

        info!("Created session {}", session.id);
        Ok(session)
    }

    /// Get a session by id
    pub async fn get(&self, id: &str) -> Result<Session, SessionError> {
        self.lookup(id)
            .await?
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Replace history and/or metadata wholesale
    pub async fn update(&self, id: &str, update: SessionUpdate) -> Result<Session, SessionError> {
        let metadata = update.metadata.as_deref().map(parse_metadata).transpose()?;

        let mut session = self.get(id).await?;
        if let Some(history) = update.history {
            session.history = history;
        }
        if let Some(metadata) = metadata {
            session.metadata = metadata;
        }
        session.updated_at = Some(Utc::now());

        self.persist(&session).await?;
        debug!("Updated session {}", id);
        Ok(session)
    }

    /// Append one locator to a session's history
    pub async fn append_history(&self, id: &str, locator: &str) -> Result<Session, SessionError> {
        let mut session = self.get(id).await?;
        session.history.push(locator.to_string());
        session.updated_at = Some(Utc::now());

        self.persist(&session).await?;
        debug!(
            "Appended {} to session {} (history length {})",
            locator,
            id,
            session.history.len()
        );
        Ok(session)
    }

    pub fn cache(&self) -> &SessionCache {
        &self.cache
    }

    /// Cache first, then storage
    async fn lookup(&self, id: &str) -> Result<Option<Session>, SessionError> {
        if !is_valid_session_id(id) {
            return Ok(None);
        }

        if let Some(session) = self.cache.get(id) {
            return Ok(Some(session));
        }

        match self
            .artifacts
            .load(&Self::snapshot_name(id), Folder::Json)
            .await
        {
            Ok(bytes) => {
                let snapshot: Value = serde_json::from_slice(&bytes)?;
                let session = Session::from_snapshot(id, &snapshot);
                self.cache.put(&session);
                Ok(Some(session))
            }
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, session: &Session) -> Result<(), SessionError> {
        let bytes = serde_json::to_vec_pretty(session)?;
        self.artifacts
            .save(&bytes, &Self::snapshot_name(&session.id), Folder::Json)
            .await?;
        self.cache.put(session);
        Ok(())
    }
}
