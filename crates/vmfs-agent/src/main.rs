use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vmfs_agent::{AgentConfig, AgentServer, LocalFs};
use vmfs_proto::ResponseMode;

#[derive(Parser, Debug)]
#[command(name = "vmfs-agent", author, version, about, long_about = None)]
struct Args {
    /// JSON agent configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the Unix socket for listening
    #[arg(long)]
    socket_path: Option<PathBuf>,

    /// Directory every request path is resolved below
    #[arg(long)]
    root: Option<PathBuf>,

    /// Reply convention shared with the clients (legacy or framed)
    #[arg(long)]
    response_mode: Option<ResponseMode>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn agent_config(&self) -> Result<AgentConfig> {
        let mut config = match &self.config {
            Some(path) => AgentConfig::from_json_file(path)
                .with_context(|| format!("loading agent config {}", path.display()))?,
            None => AgentConfig::default(),
        };
        if let Some(path) = &self.socket_path {
            config.socket_path = path.clone();
        }
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(mode) = self.response_mode {
            config.response_mode = mode;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.agent_config()?;
    info!("Starting vmfs agent, serving {}", config.root.display());

    std::fs::create_dir_all(&config.root)
        .with_context(|| format!("creating agent root {}", config.root.display()))?;
    let backend = Arc::new(LocalFs::new(&config.root));
    let mut server = AgentServer::new(&config, backend)?;

    // Set up signal handlers for graceful shutdown
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e);
            }
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down...");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down...");
        }
    }

    server.shutdown().await
}
