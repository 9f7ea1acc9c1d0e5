//! editd - image edit orchestration daemon
//!
//! Accepts a source image and an edit instruction, streams them through a
//! multimodal generation model, and stores the resulting images in local or
//! remote storage, tracking them per session.

pub mod api;
pub mod edit;
pub mod gemini;
pub mod sessions;
pub mod storage;
#[cfg(any(test, feature = "test-util"))]
pub mod testing;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use api::AppState;
use edit::EditPipeline;
use gemini::{GeminiClient, GeminiConfig, ImageGenerator};
use sessions::SessionStore;
use storage::{ArtifactStore, GcsStore, LocalStore, RemoteConfig};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// Public base URL used for locally served artifacts
    pub base_url: String,
    /// Root of the local `input/`, `result/`, `json/` folders
    pub data_dir: PathBuf,
    pub gemini: GeminiConfig,
    /// Remote object storage; `None` = local only
    pub remote: Option<RemoteConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8000)),
            base_url: "http://localhost:8000".to_string(),
            data_dir: PathBuf::from("data"),
            gemini: GeminiConfig::default(),
            remote: None,
        }
    }
}

impl Config {
    /// Layer defaults, an optional TOML file, and the environment
    ///
    /// `EDITD_`-prefixed variables override the file, with `__` for nesting
    /// (`EDITD_REMOTE__BUCKET`). `GOOGLE_API_KEY` sets the Gemini key.
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    pub fn figment(path: Option<&Path>) -> Figment {
        let path = path.unwrap_or_else(|| Path::new("editd.toml"));

        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("EDITD_").split("__"))
            .merge(
                Env::raw()
                    .only(&["GOOGLE_API_KEY"])
                    .map(|_| "gemini.api_key".into()),
            )
    }
}

/// The editd server instance
pub struct Server {
    config: Config,
    state: AppState,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Server {
    /// Create a server backed by the Gemini API
    pub async fn new(config: Config) -> Result<Self> {
        let generator = Arc::new(GeminiClient::new(config.gemini.clone())?);
        Self::with_generator(config, generator).await
    }

    /// Create a server with a specific generation backend
    pub async fn with_generator(
        config: Config,
        generator: Arc<dyn ImageGenerator>,
    ) -> Result<Self> {
        let local = LocalStore::new(&config.data_dir, &config.base_url);
        local.ensure_layout().await?;

        let artifacts = match &config.remote {
            Some(remote) => {
                let gcs = GcsStore::new(remote.clone())?;
                info!("Remote storage enabled: gs://{}", remote.bucket);
                ArtifactStore::with_remote(local, Arc::new(gcs))
            }
            None => {
                info!("Using local storage at {}", config.data_dir.display());
                ArtifactStore::local_only(local)
            }
        };
        let artifacts = Arc::new(artifacts);
        let sessions = Arc::new(SessionStore::new(artifacts.clone()));
        let pipeline = Arc::new(EditPipeline::new(
            generator.clone(),
            artifacts.clone(),
            sessions.clone(),
        ));

        let state = AppState {
            artifacts,
            sessions,
            pipeline,
            generator,
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            config,
            state,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Get the session store
    pub fn sessions(&self) -> Arc<SessionStore> {
        self.state.sessions.clone()
    }

    /// Get the artifact store
    pub fn artifacts(&self) -> Arc<ArtifactStore> {
        self.state.artifacts.clone()
    }

    /// Build the router
    pub fn router(&self) -> Router {
        api::router(self.state.clone())
    }

    /// Run the server until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        info!("editd listening on {}", local_addr);

        let router = self.router();
        let mut shutdown_rx = self.shutdown_rx.clone();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown_rx.changed().await.ok();
            })
            .await?;

        info!("editd shutdown complete");
        Ok(())
    }

    /// Signal the server to shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Get the configured bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
