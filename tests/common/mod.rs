//! Common test utilities - EditdTest harness for end-to-end testing

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use editd::gemini::Chunk;
use editd::testing::ScriptedGenerator;
use editd::{Config, Server};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Test harness that spawns a real editd server on a random port
///
/// Generation is scripted; storage is local under a temporary directory.
pub struct EditdTest {
    pub addr: SocketAddr,
    pub client: Client,
    pub generator: Arc<ScriptedGenerator>,
    server: Arc<Server>,
    _data_dir: TempDir,
    _handle: JoinHandle<()>,
}

impl EditdTest {
    /// Start a server whose generator replays `script` on every edit
    pub async fn start(script: Vec<Result<Chunk, String>>) -> Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        let data_dir = tempfile::tempdir()?;
        let config = Config {
            bind_addr: addr,
            base_url: format!("http://{}", addr),
            data_dir: data_dir.path().to_path_buf(),
            ..Config::default()
        };

        let generator = Arc::new(ScriptedGenerator::new(script));
        let server = Arc::new(Server::with_generator(config, generator.clone()).await?);
        let server_clone = server.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/health", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            generator,
            server,
            _data_dir: data_dir,
            _handle: handle,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a POST request without a body
    pub async fn post_empty(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Make a PUT request with JSON body
    pub async fn put<T: serde::Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .put(format!("{}{}", self.base_url(), path))
            .json(body)
            .send()
            .await?)
    }

    /// POST a url-encoded form
    pub async fn post_form(
        &self,
        path: &str,
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .form(fields)
            .send()
            .await?)
    }

    /// POST a multipart form with an image file and text fields
    pub async fn post_image(
        &self,
        path: &str,
        image: &[u8],
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let mut form = Form::new().part(
            "file",
            Part::bytes(image.to_vec())
                .file_name("photo.jpg")
                .mime_str("image/jpeg")?,
        );
        for (name, value) in fields {
            form = form.text(name.to_string(), value.to_string());
        }

        Ok(self
            .client
            .post(format!("{}{}", self.base_url(), path))
            .multipart(form)
            .send()
            .await?)
    }

    /// Create a session and return its id
    pub async fn create_session(&self) -> Result<String> {
        let body: serde_json::Value = self.post_empty("/api/session").await?.json().await?;
        Ok(body["id"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("session response without id"))?
            .to_string())
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for EditdTest {
    fn drop(&mut self) {
        self.shutdown();
    }
}
