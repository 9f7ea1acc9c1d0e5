//! Google Cloud Storage backend
//!
//! Uploads go through the JSON API multipart upload endpoint so object
//! metadata (content type, cache control) is set in the same request. Reads
//! go through the JSON API media download, authenticated when a token is
//! configured. Returned locators are public object URLs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{Folder, RemoteStore, StorageError};

/// Remote storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Bucket name
    pub bucket: String,
    /// JSON API base, used for reads
    pub api_url: String,
    /// Upload API base
    pub upload_url: String,
    /// Public object URL base
    pub public_url: String,
    /// OAuth bearer token for uploads and reads
    /// (e.g. from `gcloud auth print-access-token`)
    pub access_token: Option<String>,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            api_url: "https://storage.googleapis.com/storage/v1".to_string(),
            upload_url: "https://storage.googleapis.com/upload/storage/v1".to_string(),
            public_url: "https://storage.googleapis.com".to_string(),
            access_token: None,
        }
    }
}

/// Cache-Control stored with an object; snapshots must never be served stale
fn cache_control_for(key: &str) -> Option<&'static str> {
    match key.split_once('/') {
        Some((folder, _)) if folder == Folder::Json.as_str() => Some("no-cache"),
        _ => None,
    }
}

/// GCS bucket client
#[derive(Debug, Clone)]
pub struct GcsStore {
    client: Client,
    config: RemoteConfig,
}

impl GcsStore {
    /// Create a new GCS client for the configured bucket
    pub fn new(config: RemoteConfig) -> Result<Self, StorageError> {
        if config.bucket.is_empty() {
            return Err(StorageError::Remote(
                "bucket name is not configured".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self { client, config })
    }

    /// Publicly resolvable URL of an object
    pub fn public_locator(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.public_url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    /// `{api_url}/b/{bucket}/o/{key}?alt=media`, with the key as one encoded segment
    fn download_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = Url::parse(self.config.api_url.trim_end_matches('/'))
            .map_err(|e| StorageError::Remote(format!("invalid api_url: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StorageError::Remote("invalid api_url: not a base URL".to_string()))?
            .extend(["b", self.config.bucket.as_str(), "o", key]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn download_request(&self, key: &str) -> Result<RequestBuilder, StorageError> {
        Ok(self.authorize(self.client.get(self.download_url(key)?)))
    }

    /// Multipart (`multipart/related`) upload: JSON metadata part, then the media part
    fn upload_request(&self, key: &str, data: &[u8], content_type: &str) -> RequestBuilder {
        let url = format!(
            "{}/b/{}/o",
            self.config.upload_url.trim_end_matches('/'),
            self.config.bucket
        );

        let mut metadata = json!({ "name": key, "contentType": content_type });
        if let Some(cache_control) = cache_control_for(key) {
            metadata["cacheControl"] = json!(cache_control);
        }

        let boundary = format!("editd-{}", Uuid::new_v4().simple());
        let mut body = Vec::with_capacity(data.len() + 512);
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n\
                 --{b}\r\nContent-Type: {ct}\r\n\r\n",
                b = boundary,
                m = metadata,
                ct = content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        self.authorize(
            self.client
                .post(url)
                .query(&[("uploadType", "multipart")])
                .header(
                    reqwest::header::CONTENT_TYPE,
                    format!("multipart/related; boundary={}", boundary),
                )
                .body(body),
        )
    }
}

#[async_trait]
impl RemoteStore for GcsStore {
    async fn put(
        &self,
        key: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<String, StorageError> {
        let response = self.upload_request(key, data, content_type).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("GCS upload error: {} - {}", status, body);
            return Err(StorageError::Remote(format!(
                "upload of {} failed: {}",
                key, status
            )));
        }

        debug!(
            "Uploaded {} ({} bytes) to gs://{}",
            key,
            data.len(),
            self.config.bucket
        );
        Ok(self.public_locator(key))
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let response = self.download_request(key)?.send().await?;

        match response.status() {
            status if status.is_success() => Ok(Some(response.bytes().await?.to_vec())),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(StorageError::Remote(format!(
                "download of {} failed: {}",
                key, status
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("gs://{}", self.config.bucket)
    }
}
