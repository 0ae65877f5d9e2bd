//! Stream transport to the agent and the single-receive response decoder.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::Endpoint;
use crate::error::{ConnectError, TransportError};

/// Bytes of each frame echoed into debug logs.
const LOG_PREFIX_LEN: usize = 32;

/// A bidirectional byte stream the client can own.
pub trait Transport: Read + Write + Send + fmt::Debug {
    /// Close both directions.
    fn shutdown(&self) -> io::Result<()>;
}

impl Transport for UnixStream {
    fn shutdown(&self) -> io::Result<()> {
        UnixStream::shutdown(self, Shutdown::Both)
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
pub use vsock::VsockStream;

#[cfg(any(target_os = "linux", target_os = "android"))]
mod vsock {
    use std::fs::File;
    use std::io::{self, Read, Write};
    use std::os::fd::{AsRawFd, OwnedFd};
    use std::time::Duration;

    use nix::sys::socket::{self, sockopt, AddressFamily, Shutdown, SockFlag, SockType, VsockAddr};
    use nix::sys::time::{TimeVal, TimeValLike};

    use super::Transport;
    use crate::error::ConnectError;

    /// AF_VSOCK stream socket.
    ///
    /// The socket fd is held as a `File` so reads and writes go through
    /// plain `read(2)`/`write(2)`.
    #[derive(Debug)]
    pub struct VsockStream {
        file: File,
    }

    impl VsockStream {
        pub fn connect(cid: u32, port: u32, timeout: Option<Duration>) -> Result<Self, ConnectError> {
            let fd: OwnedFd = socket::socket(
                AddressFamily::Vsock,
                SockType::Stream,
                SockFlag::SOCK_CLOEXEC,
                None,
            )
            .map_err(|e| ConnectError::Socket(io::Error::from(e)))?;

            if let Some(timeout) = timeout {
                let tv = TimeVal::milliseconds(timeout.as_millis() as i64);
                socket::setsockopt(&fd, sockopt::SendTimeout, &tv)
                    .and_then(|_| socket::setsockopt(&fd, sockopt::ReceiveTimeout, &tv))
                    .map_err(|e| ConnectError::Configure(io::Error::from(e)))?;
            }

            let addr = VsockAddr::new(cid, port);
            socket::connect(fd.as_raw_fd(), &addr).map_err(|e| ConnectError::Connect {
                endpoint: format!("vsock://{cid}:{port}"),
                source: io::Error::from(e),
            })?;

            Ok(Self {
                file: File::from(fd),
            })
        }
    }

    impl Read for VsockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.file.read(buf)
        }
    }

    impl Write for VsockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.file.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for VsockStream {
        fn shutdown(&self) -> io::Result<()> {
            socket::shutdown(self.file.as_raw_fd(), Shutdown::Both).map_err(io::Error::from)
        }
    }
}

/// Open one stream to `endpoint`. No retry is attempted.
pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Connection, ConnectError> {
    let stream: Box<dyn Transport> = match endpoint {
        Endpoint::Vsock { cid, port } => connect_vsock(*cid, *port, timeout)?,
        Endpoint::Unix { path } => Box::new(connect_unix(path, timeout)?),
    };
    info!("Connected to agent at {}", endpoint);
    Ok(Connection::new(stream, endpoint.to_string()))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn connect_vsock(cid: u32, port: u32, timeout: Option<Duration>) -> Result<Box<dyn Transport>, ConnectError> {
    Ok(Box::new(VsockStream::connect(cid, port, timeout)?))
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn connect_vsock(_cid: u32, _port: u32, _timeout: Option<Duration>) -> Result<Box<dyn Transport>, ConnectError> {
    Err(ConnectError::Unsupported("vsock"))
}

fn connect_unix(path: &Path, timeout: Option<Duration>) -> Result<UnixStream, ConnectError> {
    let stream = UnixStream::connect(path).map_err(|source| ConnectError::Connect {
        endpoint: format!("unix://{}", path.display()),
        source,
    })?;
    stream
        .set_read_timeout(timeout)
        .and_then(|_| stream.set_write_timeout(timeout))
        .map_err(ConnectError::Configure)?;
    Ok(stream)
}

/// An established stream to the agent.
#[derive(Debug)]
pub struct Connection {
    stream: Box<dyn Transport>,
    peer: String,
}

impl Connection {
    pub fn new(stream: Box<dyn Transport>, peer: impl Into<String>) -> Self {
        Self {
            stream,
            peer: peer.into(),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write one whole frame.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        debug!(
            "-> {} bytes to {}: {}",
            frame.len(),
            self.peer,
            hex::encode(&frame[..frame.len().min(LOG_PREFIX_LEN)])
        );
        self.stream.write_all(frame).map_err(TransportError::Write)?;
        self.stream.flush().map_err(TransportError::Write)
    }

    /// One blocking receive into `buf`, which is zeroed first.
    ///
    /// Returns the number of bytes received; `0` means the agent closed the
    /// stream in an orderly way.
    pub fn receive_into(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        buf.fill(0);
        loop {
            match self.stream.read(buf) {
                Ok(n) => {
                    debug!("<- {} bytes from {}", n, self.peer);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Receive(e)),
            }
        }
    }

    /// One blocking receive of up to `max_bytes`.
    pub fn receive(&mut self, max_bytes: usize) -> Result<Received, TransportError> {
        let mut buf = vec![0u8; max_bytes];
        let len = self.receive_into(&mut buf)?;
        Ok(Received { buf, len })
    }

    /// Fill `buf` completely, reading as many times as needed.
    pub fn receive_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        self.stream.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => TransportError::Closed,
            _ => TransportError::Receive(e),
        })
    }

    /// Read and drop exactly `len` bytes.
    pub fn discard(&mut self, len: usize) -> Result<(), TransportError> {
        let skipped = io::copy(&mut Read::by_ref(&mut self.stream).take(len as u64), &mut io::sink())
            .map_err(TransportError::Receive)?;
        if skipped < len as u64 {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    /// Close the stream in both directions.
    pub fn shutdown(self) -> Result<(), TransportError> {
        debug!("Shutting down connection to {}", self.peer);
        self.stream.shutdown().map_err(TransportError::Write)
    }
}

/// Result of one receive: a zero-padded buffer and the received count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    buf: Vec<u8>,
    len: usize,
}

impl Received {
    /// Wrap a payload whose exact length is known.
    pub fn from_payload(payload: Vec<u8>) -> Self {
        let len = payload.len();
        Self { buf: payload, len }
    }

    /// Bytes actually received.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The whole buffer including trailing zero padding.
    pub fn padded(&self) -> &[u8] {
        &self.buf
    }

    /// Received bytes up to the first NUL, as text.
    pub fn text(&self) -> Cow<'_, str> {
        let bytes = self.bytes();
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        String::from_utf8_lossy(&bytes[..end])
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Orderly close: the receive returned no bytes.
    pub fn is_closed(&self) -> bool {
        self.len == 0
    }

    /// The reply filled the whole buffer. More bytes may or may not follow.
    pub fn is_full(&self) -> bool {
        self.len == self.buf.len() && !self.buf.is_empty()
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        self.buf.truncate(self.len);
        self.buf
    }
}
