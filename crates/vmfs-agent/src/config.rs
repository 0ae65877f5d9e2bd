//! Configuration types for the agent

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vmfs_proto::{ResponseMode, MAX_FRAME_LEN};

/// Default listening socket: the host end of a vsock proxy for port 52.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/vmfs/v.sock_52";

/// Default directory the agent serves.
pub const DEFAULT_ROOT: &str = "/tmp/vmfs/root";

/// How long a `write` whose buffered bytes end in `\r` waits for more input
/// before that `\r` is taken as its terminator.
pub const DEFAULT_SETTLE_MS: u64 = 20;

/// Agent configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub socket_path: PathBuf,
    /// Every request path is resolved below this directory.
    pub root: PathBuf,
    pub response_mode: ResponseMode,
    /// Largest request frame buffered before the connection is dropped.
    pub max_frame_len: usize,
    pub settle_ms: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            root: PathBuf::from(DEFAULT_ROOT),
            response_mode: ResponseMode::default(),
            max_frame_len: MAX_FRAME_LEN,
            settle_ms: DEFAULT_SETTLE_MS,
        }
    }
}

impl AgentConfig {
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
