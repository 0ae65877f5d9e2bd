//! Error types for the vmfs client

use std::io;

use vmfs_proto::{EncodingError, ReplyError};

/// The transport could not be established.
#[derive(thiserror::Error, Debug)]
pub enum ConnectError {
    #[error("failed to create socket: {0}")]
    Socket(#[source] io::Error),
    #[error("failed to configure socket: {0}")]
    Configure(#[source] io::Error),
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("{0} sockets are not supported on this platform")]
    Unsupported(&'static str),
}

/// An established connection failed.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("write failed: {0}")]
    Write(#[source] io::Error),
    #[error("receive failed: {0}")]
    Receive(#[source] io::Error),
    #[error("connection closed by agent")]
    Closed,
}

/// Errors surfaced by a single client operation.
#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Connect(#[from] ConnectError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("invalid request: {0}")]
    Encoding(#[from] EncodingError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ReplyError),
    #[error("agent rejected {operation}: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
}

/// Errors surfaced by a script run.
#[derive(thiserror::Error, Debug)]
pub enum SequenceError {
    #[error("invalid script: {0}")]
    InvalidScript(String),
    #[error("step {index} ({operation}) failed: {source}")]
    Step {
        index: usize,
        operation: &'static str,
        #[source]
        source: ClientError,
    },
    #[error("cancelled before step {index}")]
    Cancelled { index: usize },
    #[error("sequencer already ran")]
    AlreadyRan,
}

impl SequenceError {
    /// Index of the step that did not complete, if any.
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::Step { index, .. } | Self::Cancelled { index } => Some(*index),
            _ => None,
        }
    }
}
