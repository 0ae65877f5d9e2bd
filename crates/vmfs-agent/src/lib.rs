// vmfs agent
//
// Host side of the VM-socket filesystem proxy: accepts request frames from
// guest clients and performs them against a directory on the host.

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod server;

pub use backend::{AgentResult, Backend, LocalFs};
pub use config::AgentConfig;
pub use dispatch::{execute, handle, Outcome};
pub use error::AgentError;
pub use server::{serve_connection, AgentServer, ConnectionOptions};
