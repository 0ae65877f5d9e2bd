//! Configuration types for the vmfs client

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use vmfs_proto::{ResponseMode, AGENT_PORT, HOST_CID, MAX_CONTENT_LEN};

/// Receive capacity for legacy `read` replies.
pub const DEFAULT_READ_CAPACITY: usize = 500;

/// Where the agent listens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Endpoint {
    /// AF_VSOCK stream from a guest to its host.
    Vsock { cid: u32, port: u32 },
    /// Unix stream socket, e.g. the host side of a vsock proxy.
    Unix { path: PathBuf },
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::Vsock {
            cid: HOST_CID,
            port: AGENT_PORT,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vsock { cid, port } => write!(f, "vsock://{cid}:{port}"),
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
        }
    }
}

/// Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    pub response_mode: ResponseMode,
    /// Buffer size for the single receive of a legacy `read` reply.
    pub read_capacity: usize,
    /// Largest framed reply payload accepted, not counting the 5-byte header.
    pub max_reply_len: usize,
    /// Send/receive timeout; `None` blocks indefinitely.
    pub io_timeout_ms: Option<u64>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            response_mode: ResponseMode::default(),
            read_capacity: DEFAULT_READ_CAPACITY,
            max_reply_len: MAX_CONTENT_LEN,
            io_timeout_ms: None,
        }
    }
}

impl ClientConfig {
    /// Load a JSON config file; missing keys fall back to defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.map(Duration::from_millis)
    }
}
