//! vmfs client: guest side of the VM-socket filesystem proxy
//!
//! Connects to the host agent, encodes filesystem operations into request
//! frames and runs scripts of dependent operations over one connection.

pub mod client;
pub mod config;
pub mod error;
pub mod script;
pub mod sequencer;
pub mod transport;

pub use client::{Client, Response};
pub use config::{ClientConfig, Endpoint, DEFAULT_READ_CAPACITY};
pub use error::{ClientError, ConnectError, SequenceError, TransportError};
pub use script::{CanonicalScript, Script, Step, TODO_CONTENT};
pub use sequencer::{CancelToken, Sequencer, SequencerState, StepReport};
pub use transport::{connect, Connection, Received, Transport};
pub use vmfs_proto::{Operation, ResponseMode};
