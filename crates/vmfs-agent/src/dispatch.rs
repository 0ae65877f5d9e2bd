//! Maps decoded operations onto a backend and picks the reply.

use tracing::{info, warn};
use vmfs_proto::{Operation, Reply, ResponseMode};

use crate::backend::{AgentResult, Backend};

/// What the connection should do after an operation ran.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Write these bytes back to the client.
    Reply(Vec<u8>),
    /// Send nothing.
    Silent,
    /// Close the connection.
    Close,
}

/// Run one operation. Returns file content for `read`.
pub async fn execute(backend: &dyn Backend, op: &Operation) -> AgentResult<Option<Vec<u8>>> {
    match op {
        Operation::CreateDir { path } => backend.create_dir(path).await.map(|_| None),
        Operation::Write { path, content } => backend.write(path, content).await.map(|_| None),
        Operation::Read { path } => backend.read(path).await.map(Some),
        Operation::Copy { src_path, dst_path } => backend.copy(src_path, dst_path).await.map(|_| None),
        Operation::RemoveDir { path } => backend.remove_dir(path).await.map(|_| None),
        Operation::RemoveDirAll { path } => backend.remove_dir_all(path).await.map(|_| None),
    }
}

/// Run one operation and encode the reply `mode` calls for.
///
/// A legacy `read` must put at least one byte on the wire or the client
/// blocks in its receive: an empty file is sent as a single NUL, and a
/// failed read closes the connection.
pub async fn handle(backend: &dyn Backend, mode: ResponseMode, op: &Operation) -> Outcome {
    let result = execute(backend, op).await;
    match &result {
        Ok(_) => info!("{} ok", op.name()),
        Err(e) => warn!("{} failed: {}", op.name(), e),
    }

    match (mode, result) {
        (ResponseMode::Framed, Ok(content)) => framed(Reply::ok(content.unwrap_or_default())),
        (ResponseMode::Framed, Err(e)) => framed(Reply::error(e.to_string())),
        (ResponseMode::Legacy, Ok(Some(content))) if content.is_empty() => Outcome::Reply(vec![0]),
        (ResponseMode::Legacy, Ok(Some(content))) => Outcome::Reply(content),
        (ResponseMode::Legacy, Ok(None)) => Outcome::Silent,
        (ResponseMode::Legacy, Err(_)) if op.expects_content() => Outcome::Close,
        (ResponseMode::Legacy, Err(_)) => Outcome::Silent,
    }
}

fn framed(reply: Reply) -> Outcome {
    match reply.encode() {
        Ok(bytes) => Outcome::Reply(bytes),
        Err(e) => {
            warn!("Cannot encode reply: {}", e);
            Outcome::Close
        }
    }
}
