//! In-memory agent used by the client tests.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::thread::{self, JoinHandle};

use vmfs_client::{ClientConfig, Client, Connection};
use vmfs_proto::{Operation, Reply, ResponseMode};

/// Filesystem state left behind by the mock agent.
#[derive(Debug, Default)]
pub struct MockState {
    pub dirs: BTreeSet<String>,
    pub files: BTreeMap<String, Vec<u8>>,
    pub received: Vec<Operation>,
}

impl MockState {
    fn apply(&mut self, op: &Operation) -> Result<Option<Vec<u8>>, String> {
        match op {
            Operation::CreateDir { path } => {
                if !self.dirs.insert(path.clone()) {
                    return Err(format!("{path} already exists"));
                }
                Ok(None)
            }
            Operation::Write { path, content } => {
                self.files.insert(path.clone(), content.clone());
                Ok(None)
            }
            Operation::Read { path } => self
                .files
                .get(path)
                .cloned()
                .map(Some)
                .ok_or_else(|| format!("{path} not found")),
            Operation::Copy { src_path, dst_path } => {
                let content = self
                    .files
                    .get(src_path)
                    .cloned()
                    .ok_or_else(|| format!("{src_path} not found"))?;
                self.files.insert(dst_path.clone(), content);
                Ok(None)
            }
            Operation::RemoveDir { path } => {
                if !self.dirs.remove(path) {
                    return Err(format!("{path} not found"));
                }
                Ok(None)
            }
            Operation::RemoveDirAll { path } => {
                if !self.dirs.remove(path) {
                    return Err(format!("{path} not found"));
                }
                let prefix = format!("{path}/");
                self.files.retain(|name, _| !name.starts_with(&prefix));
                self.dirs.retain(|name| !name.starts_with(&prefix));
                Ok(None)
            }
        }
    }
}

/// Spawn a mock agent on one end of a socket pair.
pub fn spawn(mode: ResponseMode) -> (Connection, JoinHandle<MockState>) {
    let (local, mut remote) = UnixStream::pair().unwrap();
    let handle = thread::spawn(move || {
        let mut state = MockState::default();
        let mut pending = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = remote.read(&mut chunk).unwrap();
            if n == 0 {
                return state;
            }
            pending.extend_from_slice(&chunk[..n]);

            loop {
                let (op, used) = match Operation::decode_prefix_settled(&pending) {
                    Ok(decoded) => decoded,
                    Err(e) if e.is_incomplete() || pending.is_empty() => break,
                    Err(e) => panic!("mock agent got a bad frame: {e}"),
                };
                pending.drain(..used);

                let result = state.apply(&op);
                match (mode, result) {
                    (ResponseMode::Framed, Ok(content)) => {
                        let reply = Reply::ok(content.unwrap_or_default());
                        remote.write_all(&reply.encode().unwrap()).unwrap();
                    }
                    (ResponseMode::Framed, Err(message)) => {
                        remote.write_all(&Reply::error(message).encode().unwrap()).unwrap();
                    }
                    (ResponseMode::Legacy, Ok(Some(content))) => {
                        remote.write_all(&content).unwrap();
                    }
                    (ResponseMode::Legacy, Ok(None)) => {}
                    (ResponseMode::Legacy, Err(_)) if op.expects_content() => return state,
                    (ResponseMode::Legacy, Err(_)) => {}
                }
                state.received.push(op);
            }
        }
    });
    (Connection::new(Box::new(local), "mock"), handle)
}

/// A client talking to a fresh mock agent.
pub fn client(mode: ResponseMode, read_capacity: usize) -> (Client, JoinHandle<MockState>) {
    let (conn, handle) = spawn(mode);
    let config = ClientConfig {
        response_mode: mode,
        read_capacity,
        ..ClientConfig::default()
    };
    (Client::new(conn, &config), handle)
}
