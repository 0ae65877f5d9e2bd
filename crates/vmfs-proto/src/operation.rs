//! Filesystem operations and their request frame encoding

use serde::{Deserialize, Serialize};

use crate::error::{EncodingError, FrameError};
use crate::frame::{FrameBuilder, FrameReader};

/// One remote filesystem action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateDir {
        path: String,
    },
    Write {
        path: String,
        #[serde(with = "content_text")]
        content: Vec<u8>,
    },
    Read {
        path: String,
    },
    Copy {
        src_path: String,
        dst_path: String,
    },
    RemoveDir {
        path: String,
    },
    RemoveDirAll {
        path: String,
    },
}

impl Operation {
    pub fn create_dir(path: impl Into<String>) -> Self {
        Self::CreateDir { path: path.into() }
    }

    pub fn write(path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::Write {
            path: path.into(),
            content: content.into(),
        }
    }

    pub fn read(path: impl Into<String>) -> Self {
        Self::Read { path: path.into() }
    }

    pub fn copy(src_path: impl Into<String>, dst_path: impl Into<String>) -> Self {
        Self::Copy {
            src_path: src_path.into(),
            dst_path: dst_path.into(),
        }
    }

    pub fn remove_dir(path: impl Into<String>) -> Self {
        Self::RemoveDir { path: path.into() }
    }

    pub fn remove_dir_all(path: impl Into<String>) -> Self {
        Self::RemoveDirAll { path: path.into() }
    }

    /// Wire name of the operation.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateDir { .. } => "create_dir",
            Self::Write { .. } => "write",
            Self::Read { .. } => "read",
            Self::Copy { .. } => "copy",
            Self::RemoveDir { .. } => "remove_dir",
            Self::RemoveDirAll { .. } => "remove_dir_all",
        }
    }

    /// Whether the agent answers this operation even in legacy mode.
    pub fn expects_content(&self) -> bool {
        matches!(self, Self::Read { .. })
    }

    /// Serialize into a request frame.
    pub fn encode(&self) -> Result<Vec<u8>, EncodingError> {
        let mut frame = FrameBuilder::with_capacity(self.encoded_len());
        frame.text("operation", self.name())?;
        match self {
            Self::CreateDir { path }
            | Self::Read { path }
            | Self::RemoveDir { path }
            | Self::RemoveDirAll { path } => {
                frame.text("path", path)?;
            }
            Self::Write { path, content } => {
                frame.text("path", path)?.raw(content)?;
            }
            Self::Copy { src_path, dst_path } => {
                frame.text("src_path", src_path)?.text("dst_path", dst_path)?;
            }
        }
        Ok(frame.finish())
    }

    /// Exact frame size for a valid operation.
    pub fn encoded_len(&self) -> usize {
        let fields = match self {
            Self::CreateDir { path }
            | Self::Read { path }
            | Self::RemoveDir { path }
            | Self::RemoveDirAll { path } => path.len() + 1,
            Self::Write { path, content } => path.len() + 1 + content.len(),
            Self::Copy { src_path, dst_path } => src_path.len() + 1 + dst_path.len() + 1,
        };
        self.name().len() + 1 + fields + 1
    }

    /// Split one complete frame back into an operation.
    pub fn decode(frame: &[u8]) -> Result<Self, FrameError> {
        let (op, consumed) = Self::decode_prefix_settled(frame)?;
        if consumed != frame.len() {
            return Err(FrameError::TrailingBytes(frame.len() - consumed));
        }
        Ok(op)
    }

    /// Decode the first frame in `buf`, returning it and the bytes consumed.
    ///
    /// Frames of text-only operations end right after their last field. A
    /// `write` frame has no length prefix: its content ends at the first `\r`
    /// followed by another operation name and its NUL. Content that itself
    /// contains such a sequence is split wrongly; the wire format has no way
    /// to express it.
    ///
    /// `buf` is what a stream has delivered so far, so a `\r` in last position
    /// may be content whose remainder is still in flight. That case returns
    /// [`FrameError::Unsettled`]; once the stream is idle or closed, decode
    /// with [`Operation::decode_prefix_settled`].
    pub fn decode_prefix(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        Self::decode_with(buf, false)
    }

    /// Like [`Operation::decode_prefix`], for a buffer known to hold every
    /// byte sent so far: a trailing `\r` closes a `write` frame.
    pub fn decode_prefix_settled(buf: &[u8]) -> Result<(Self, usize), FrameError> {
        Self::decode_with(buf, true)
    }

    fn decode_with(buf: &[u8], settled: bool) -> Result<(Self, usize), FrameError> {
        if buf.is_empty() {
            return Err(FrameError::Empty);
        }
        let mut reader = FrameReader::new(buf);
        let name = reader.text("frame", "operation")?;
        let op = match name.as_str() {
            "create_dir" => Self::CreateDir {
                path: reader.text("create_dir", "path")?,
            },
            "read" => Self::Read {
                path: reader.text("read", "path")?,
            },
            "remove_dir" => Self::RemoveDir {
                path: reader.text("remove_dir", "path")?,
            },
            "remove_dir_all" => Self::RemoveDirAll {
                path: reader.text("remove_dir_all", "path")?,
            },
            "copy" => Self::Copy {
                src_path: reader.text("copy", "src_path")?,
                dst_path: reader.text("copy", "dst_path")?,
            },
            "write" => {
                let path = reader.text("write", "path")?;
                let content = reader.content(starts_frame, settled)?;
                return Ok((Self::Write { path, content }, reader.position()));
            }
            _ => return Err(FrameError::UnknownOperation(name)),
        };
        reader.terminator()?;
        Ok((op, reader.position()))
    }
}

const OPERATION_NAMES: [&str; 6] = ["create_dir", "write", "read", "copy", "remove_dir", "remove_dir_all"];

fn starts_frame(rest: &[u8]) -> bool {
    OPERATION_NAMES
        .iter()
        .any(|name| rest.starts_with(name.as_bytes()) && rest.get(name.len()) == Some(&0))
}

/// Scripts are JSON documents, so write content travels as text there.
/// Content that is not UTF-8 cannot be put in a script.
mod content_text {
    use serde::{ser, Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text = std::str::from_utf8(content)
            .map_err(|e| ser::Error::custom(format!("write content is not UTF-8: {e}")))?;
        serializer.serialize_str(text)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
