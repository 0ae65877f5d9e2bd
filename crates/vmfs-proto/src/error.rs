//! Error types for vmfs frames

/// An operand violates the framing preconditions.
///
/// These are caller errors: the encoder refuses to build a frame the agent
/// would split differently from what the caller meant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("{field} contains an embedded NUL byte")]
    EmbeddedNul { field: &'static str },
    #[error("{field} is empty")]
    EmptyField { field: &'static str },
    #[error("{field} is {len} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("content is {len} bytes, limit is {max}")]
    ContentTooLarge { len: usize, max: usize },
}

/// A received request frame could not be split back into an operation.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,
    #[error("frame is not terminated")]
    MissingTerminator,
    /// Write content ends at the last buffered `\r`, which may still turn
    /// out to be content once more bytes arrive.
    #[error("write content may continue past the buffered bytes")]
    Unsettled,
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("missing field {field} for {operation}")]
    MissingField {
        operation: &'static str,
        field: &'static str,
    },
    #[error("empty field {field}")]
    EmptyField { field: &'static str },
    #[error("{0} unexpected bytes after the last field")]
    TrailingBytes(usize),
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
    #[error("frame exceeds {max} bytes")]
    TooLarge { max: usize },
}

impl FrameError {
    /// Whether more bytes from the stream could still complete the frame.
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            Self::MissingTerminator | Self::Unsettled | Self::MissingField { .. }
        )
    }
}

/// A reply header or payload is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply header is {0} bytes, expected 5")]
    ShortHeader(usize),
    #[error("unknown reply status {0:#04x}")]
    UnknownStatus(u8),
    #[error("reply payload is {len} bytes, limit is {max}")]
    TooLarge { len: usize, max: usize },
    #[error("reply declares {declared} payload bytes, got {actual}")]
    LengthMismatch { declared: usize, actual: usize },
}
