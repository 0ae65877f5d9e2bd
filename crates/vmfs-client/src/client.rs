//! Request/response exchange with the agent over one connection.

use tracing::{debug, warn};
use vmfs_proto::{Operation, Reply, ReplyError, ResponseMode, Status, REPLY_HEADER_LEN};

use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::transport::{self, Connection, Received};

/// What the agent sent back for one operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Legacy mode: nothing is sent back for this operation.
    Unacknowledged,
    /// The agent reported success.
    Ack,
    /// Content returned by a `read`.
    Content(Received),
}

impl Response {
    pub fn content(&self) -> Option<&Received> {
        match self {
            Self::Content(received) => Some(received),
            _ => None,
        }
    }
}

/// Client for the filesystem agent.
#[derive(Debug)]
pub struct Client {
    conn: Connection,
    mode: ResponseMode,
    read_capacity: usize,
    max_reply_len: usize,
}

impl Client {
    /// Connect to the configured endpoint.
    pub fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let conn = transport::connect(&config.endpoint, config.io_timeout())?;
        Ok(Self::new(conn, config))
    }

    /// Wrap an existing connection.
    pub fn new(conn: Connection, config: &ClientConfig) -> Self {
        Self {
            conn,
            mode: config.response_mode,
            read_capacity: config.read_capacity,
            max_reply_len: config.max_reply_len,
        }
    }

    pub fn response_mode(&self) -> ResponseMode {
        self.mode
    }

    /// Encode `op`, send it, and consume whatever reply the mode defines.
    pub fn execute(&mut self, op: &Operation) -> Result<Response, ClientError> {
        let frame = op.encode()?;
        debug!("Sending {} ({} bytes)", op.name(), frame.len());
        self.conn.send(&frame)?;

        match self.mode {
            ResponseMode::Legacy => self.legacy_response(op),
            ResponseMode::Framed => self.framed_response(op),
        }
    }

    fn legacy_response(&mut self, op: &Operation) -> Result<Response, ClientError> {
        if !op.expects_content() {
            return Ok(Response::Unacknowledged);
        }
        let received = self.conn.receive(self.read_capacity)?;
        if received.is_closed() {
            return Err(TransportError::Closed.into());
        }
        if received.is_full() {
            debug!(
                "{} reply filled the {}-byte buffer; any remainder stays queued",
                op.name(),
                self.read_capacity
            );
        }
        Ok(Response::Content(received))
    }

    fn framed_response(&mut self, op: &Operation) -> Result<Response, ClientError> {
        let mut header = [0u8; REPLY_HEADER_LEN];
        self.conn.receive_exact(&mut header)?;
        let (status, len) = match Reply::decode_header(&header, self.max_reply_len) {
            Err(ReplyError::TooLarge { len, max }) => {
                warn!("Discarding {}-byte {} reply, limit is {}", len, op.name(), max);
                self.conn.discard(len)?;
                return Err(ReplyError::TooLarge { len, max }.into());
            }
            decoded => decoded?,
        };

        let mut payload = vec![0u8; len];
        self.conn.receive_exact(&mut payload)?;

        match status {
            Status::Error => {
                let message = String::from_utf8_lossy(&payload).into_owned();
                warn!("Agent rejected {}: {}", op.name(), message);
                Err(ClientError::Rejected {
                    operation: op.name(),
                    message,
                })
            }
            Status::Ok if op.expects_content() => Ok(Response::Content(Received::from_payload(payload))),
            Status::Ok => Ok(Response::Ack),
        }
    }

    pub fn create_dir(&mut self, path: &str) -> Result<Response, ClientError> {
        self.execute(&Operation::create_dir(path))
    }

    pub fn write(&mut self, path: &str, content: &[u8]) -> Result<Response, ClientError> {
        self.execute(&Operation::write(path, content))
    }

    /// Read a file. In legacy mode the result is bounded by the read capacity.
    pub fn read(&mut self, path: &str) -> Result<Received, ClientError> {
        match self.execute(&Operation::read(path))? {
            Response::Content(received) => Ok(received),
            _ => Err(TransportError::Closed.into()),
        }
    }

    pub fn copy(&mut self, src_path: &str, dst_path: &str) -> Result<Response, ClientError> {
        self.execute(&Operation::copy(src_path, dst_path))
    }

    pub fn remove_dir(&mut self, path: &str) -> Result<Response, ClientError> {
        self.execute(&Operation::remove_dir(path))
    }

    pub fn remove_dir_all(&mut self, path: &str) -> Result<Response, ClientError> {
        self.execute(&Operation::remove_dir_all(path))
    }

    /// Close the connection explicitly.
    pub fn shutdown(self) -> Result<(), ClientError> {
        Ok(self.conn.shutdown()?)
    }
}
