//! editd - image edit orchestration daemon

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use editd::{Config, Server};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "editd", about = "Image edit orchestration server")]
struct Args {
    /// TOML config file (default: editd.toml, if present)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to bind to
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Local artifact directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Public base URL for locally served artifacts
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "editd=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }

    if config.gemini.api_key.is_none() {
        warn!("GOOGLE_API_KEY not set; edit requests will fail");
    }

    let server = Server::new(config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
