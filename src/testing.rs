//! Test doubles for the generation and remote storage seams
//!
//! Compiled for unit tests and, behind the `test-util` feature, for the
//! integration harness under `tests/`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::gemini::{
    Chunk, ChunkStream, GenerateRequest, GenerationError, ImageGenerator, InlineImage,
};
use crate::storage::{RemoteStore, StorageError};

/// A chunk carrying only text
pub fn text_chunk(text: &str) -> Chunk {
    Chunk {
        text: Some(text.to_string()),
        images: Vec::new(),
    }
}

/// A chunk carrying one JPEG payload
pub fn image_chunk(data: &[u8]) -> Chunk {
    Chunk {
        text: None,
        images: vec![InlineImage {
            mime_type: "image/jpeg".to_string(),
            data: data.to_vec(),
        }],
    }
}

/// Generator that replays the same script on every call
///
/// An `Err` entry ends the stream with a stream error.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    script: Vec<Result<Chunk, String>>,
    reject: Option<(u16, String)>,
    calls: AtomicUsize,
    last_request: Mutex<Option<GenerateRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: Vec<Result<Chunk, String>>) -> Self {
        Self {
            script,
            ..Self::default()
        }
    }

    /// Generator whose calls fail before any chunk is produced
    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            reject: Some((status, body.to_string())),
            ..Self::default()
        }
    }

    /// Number of generation calls made
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<GenerateRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate_stream(
        &self,
        request: GenerateRequest,
    ) -> Result<ChunkStream, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock() = Some(request);

        if let Some((status, body)) = &self.reject {
            return Err(GenerationError::Api {
                status: *status,
                body: body.clone(),
            });
        }

        let mut items = Vec::new();
        for step in &self.script {
            match step {
                Ok(chunk) => items.push(Ok(chunk.clone())),
                Err(message) => {
                    items.push(Err(GenerationError::Stream(message.clone())));
                    break;
                }
            }
        }

        Ok(Box::pin(futures_util::stream::iter(items)))
    }
}

/// In-memory remote store
#[derive(Debug, Default)]
pub struct MemoryRemote {
    public_base: String,
    objects: Mutex<HashMap<String, (Vec<u8>, String)>>,
    latency: Option<Duration>,
}

impl MemoryRemote {
    pub fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            objects: Mutex::new(HashMap::new()),
            latency: None,
        }
    }

    /// Remote whose uploads take `latency` before they land
    pub fn with_latency(public_base: &str, latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new(public_base)
        }
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.lock().get(key).map(|(_, ct)| ct.clone())
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.objects
            .lock()
            .insert(key.to_string(), (data.to_vec(), content_type.to_string()));
        Ok(format!("{}/{}", self.public_base, key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.objects.lock().get(key).map(|(data, _)| data.clone()))
    }

    fn describe(&self) -> String {
        format!("memory ({})", self.public_base)
    }
}

/// Remote store that is always unreachable
#[derive(Debug, Default)]
pub struct FailingRemote;

#[async_trait]
impl RemoteStore for FailingRemote {
    async fn put(
        &self,
        key: &str,
        _data: &[u8],
        _content_type: &str,
    ) -> Result<String, StorageError> {
        Err(StorageError::Remote(format!(
            "upload of {} failed: unreachable",
            key
        )))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Err(StorageError::Remote(format!("download of {} failed: unreachable", key)))
    }

    fn describe(&self) -> String {
        "unreachable".to_string()
    }
}
