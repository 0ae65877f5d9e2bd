use crate::backend::Backend;
use crate::config::AgentConfig;
use crate::dispatch::{handle, Outcome};
use anyhow::{anyhow, bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::time::timeout;
use tokio_stream::{wrappers::UnixListenerStream, StreamExt};
use tracing::{debug, error, info, warn};
use vmfs_proto::{FrameError, Operation, Reply, ResponseMode};

const READ_CHUNK: usize = 64 * 1024;
const LOG_PREFIX_LEN: usize = 32;

pub struct AgentServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    backend: Arc<dyn Backend>,
    options: ConnectionOptions,
}

impl AgentServer {
    pub fn new(config: &AgentConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        let socket_path = config.socket_path.clone();

        // Ensure socket directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Remove a stale socket left by a previous run
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }

        let listener = UnixListener::bind(&socket_path)?;
        info!("Agent listening on socket: {}", socket_path.display());

        Ok(Self {
            socket_path,
            listener: Some(listener),
            backend,
            options: ConnectionOptions::from(config),
        })
    }

    pub fn socket_path(&self) -> &PathBuf {
        &self.socket_path
    }

    pub async fn run(&mut self) -> Result<()> {
        let listener = self.listener.take().ok_or_else(|| anyhow!("Server not initialized"))?;
        let mut stream = UnixListenerStream::new(listener);

        info!("vmfs agent started ({} replies)", self.options.mode);

        while let Some(stream) = stream.next().await {
            match stream {
                Ok(socket) => {
                    let backend = Arc::clone(&self.backend);
                    let options = self.options;
                    tokio::spawn(async move {
                        if let Err(e) = serve_connection(socket, backend.as_ref(), options).await {
                            error!("Error handling client: {}", e);
                        }
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {}", e);
                }
            }
        }

        Ok(())
    }

    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down agent...");

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        Ok(())
    }
}

/// Per-connection settings taken from [`AgentConfig`].
#[derive(Clone, Copy, Debug)]
pub struct ConnectionOptions {
    pub mode: ResponseMode,
    pub max_frame_len: usize,
    /// Quiet time after which a trailing `\r` closes a pending `write`.
    pub settle_window: Duration,
}

impl From<&AgentConfig> for ConnectionOptions {
    fn from(config: &AgentConfig) -> Self {
        Self {
            mode: config.response_mode,
            max_frame_len: config.max_frame_len,
            settle_window: Duration::from_millis(config.settle_ms),
        }
    }
}

/// Where the buffered bytes stand after decoding as many frames as possible.
enum Progress {
    /// Need more bytes.
    Waiting,
    /// A `write` may end at the last buffered `\r`.
    Unsettled,
    /// The connection must be closed.
    Closed,
}

/// Serve requests from one client until it disconnects.
///
/// Requests on a connection are handled strictly in order; each reply is
/// written before the next frame is decoded.
pub async fn serve_connection<S>(mut socket: S, backend: &dyn Backend, options: ConnectionOptions) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    debug!("Handling new client connection");

    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    let mut unsettled = false;

    loop {
        let read = if unsettled {
            timeout(options.settle_window, socket.read(&mut chunk)).await.ok()
        } else {
            Some(socket.read(&mut chunk).await)
        };

        let progress = match read {
            // Nothing else arrived, so the trailing `\r` ends the write.
            None => drain_frames(&mut socket, &mut pending, backend, options, true).await?,
            Some(read) => {
                let n = read?;
                if n == 0 {
                    if unsettled {
                        if let Progress::Closed = drain_frames(&mut socket, &mut pending, backend, options, true).await? {
                            return Ok(());
                        }
                    }
                    if !pending.is_empty() {
                        warn!("Client disconnected with {} undecoded bytes", pending.len());
                    }
                    debug!("Client disconnected");
                    return Ok(());
                }
                debug!("<- {} bytes: {}", n, hex::encode(&chunk[..n.min(LOG_PREFIX_LEN)]));
                pending.extend_from_slice(&chunk[..n]);
                drain_frames(&mut socket, &mut pending, backend, options, false).await?
            }
        };

        match progress {
            Progress::Waiting => unsettled = false,
            Progress::Unsettled => unsettled = true,
            Progress::Closed => return Ok(()),
        }
    }
}

/// Decode and handle every complete frame at the front of `pending`.
///
/// `settled` means no further bytes are queued behind `pending`.
async fn drain_frames<S>(
    socket: &mut S,
    pending: &mut Vec<u8>,
    backend: &dyn Backend,
    options: ConnectionOptions,
    settled: bool,
) -> Result<Progress>
where
    S: AsyncWrite + Unpin,
{
    loop {
        let decoded = if settled {
            Operation::decode_prefix_settled(pending)
        } else {
            Operation::decode_prefix(pending)
        };
        match decoded {
            Ok((op, used)) => {
                pending.drain(..used);
                match handle(backend, options.mode, &op).await {
                    Outcome::Reply(bytes) => {
                        socket.write_all(&bytes).await?;
                        socket.flush().await?;
                    }
                    Outcome::Silent => {}
                    Outcome::Close => {
                        debug!("Closing connection after failed {}", op.name());
                        return Ok(Progress::Closed);
                    }
                }
            }
            Err(FrameError::Empty) => return Ok(Progress::Waiting),
            Err(e) if e.is_incomplete() => {
                if pending.len() > options.max_frame_len {
                    let err = FrameError::TooLarge {
                        max: options.max_frame_len,
                    };
                    if options.mode == ResponseMode::Framed {
                        socket.write_all(&Reply::error(err.to_string()).encode()?).await?;
                        socket.flush().await?;
                    }
                    bail!("dropping client: {}", err);
                }
                return Ok(match e {
                    FrameError::Unsettled => Progress::Unsettled,
                    _ => Progress::Waiting,
                });
            }
            Err(e) => {
                warn!("Discarding malformed frame: {}", e);
                pending.clear();
                if options.mode == ResponseMode::Framed {
                    socket.write_all(&Reply::error(e.to_string()).encode()?).await?;
                    socket.flush().await?;
                }
                return Ok(Progress::Waiting);
            }
        }
    }
}
