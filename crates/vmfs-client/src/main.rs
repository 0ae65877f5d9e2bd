use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vmfs_client::{
    CanonicalScript, Client, ClientConfig, Endpoint, ResponseMode, Script, Sequencer,
};

/// Run a filesystem script against the host agent over a VM socket.
#[derive(Parser, Debug)]
#[command(name = "vmfs-workload", author, version, about, long_about = None)]
struct Args {
    /// JSON client configuration; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Destination context id of the agent
    #[arg(long)]
    cid: Option<u32>,

    /// Destination port of the agent
    #[arg(long)]
    port: Option<u32>,

    /// Connect to a Unix socket instead of a VM socket
    #[arg(long, conflicts_with_all = ["cid", "port"])]
    unix_socket: Option<PathBuf>,

    /// Reply convention shared with the agent (legacy or framed)
    #[arg(long)]
    response_mode: Option<ResponseMode>,

    /// Receive buffer size for legacy read replies
    #[arg(long)]
    read_capacity: Option<usize>,

    /// Send/receive timeout in milliseconds
    #[arg(long)]
    io_timeout_ms: Option<u64>,

    /// JSON script to run instead of the canonical workload
    #[arg(long)]
    script: Option<PathBuf>,

    /// Working directory used by the canonical workload
    #[arg(long, default_value = "pidir")]
    dir: String,

    /// Also write the bytes read back into this file (canonical workload)
    #[arg(long)]
    write_back: Option<String>,

    /// Also create and remove this second directory (canonical workload)
    #[arg(long)]
    second_dir: Option<String>,

    /// Log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)
                .with_context(|| format!("loading client config {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if let Some(path) = &self.unix_socket {
            config.endpoint = Endpoint::Unix { path: path.clone() };
        } else if self.cid.is_some() || self.port.is_some() {
            let (default_cid, default_port) = match config.endpoint {
                Endpoint::Vsock { cid, port } => (cid, port),
                Endpoint::Unix { .. } => (vmfs_proto::HOST_CID, vmfs_proto::AGENT_PORT),
            };
            config.endpoint = Endpoint::Vsock {
                cid: self.cid.unwrap_or(default_cid),
                port: self.port.unwrap_or(default_port),
            };
        }
        if let Some(mode) = self.response_mode {
            config.response_mode = mode;
        }
        if let Some(capacity) = self.read_capacity {
            config.read_capacity = capacity;
        }
        if self.io_timeout_ms.is_some() {
            config.io_timeout_ms = self.io_timeout_ms;
        }
        Ok(config)
    }

    fn script(&self) -> Result<Script> {
        match &self.script {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading script {}", path.display()))?;
                Script::from_json(&raw).with_context(|| format!("parsing script {}", path.display()))
            }
            None => Ok(Script::canonical(&CanonicalScript {
                dir: self.dir.clone(),
                write_back: self.write_back.clone(),
                second_dir: self.second_dir.clone(),
                ..CanonicalScript::default()
            })),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = args.client_config()?;
    let script = args.script()?;

    info!(
        "Running {} steps against {} ({} replies)",
        script.len(),
        config.endpoint,
        config.response_mode
    );

    let client = Client::connect(&config).context("connecting to agent")?;
    let mut sequencer = Sequencer::new(client);
    let reports = sequencer.run(&script).context("running script")?;

    for report in &reports {
        if let Some(received) = report.response.content() {
            println!("read value: {}", received.text());
        }
    }

    sequencer
        .into_client()
        .shutdown()
        .context("closing connection")?;
    info!("Done");
    Ok(())
}
