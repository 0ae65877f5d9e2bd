//! vmfs protocol — request frames and replies for the VM-socket filesystem proxy
//!
//! A guest sends one request frame per filesystem operation: the operation
//! name and its text operands, each NUL-terminated, an optional raw content
//! field, and a single `\r` terminator. The agent on the host answers
//! according to the negotiated [`ResponseMode`].

pub mod error;
pub mod frame;
pub mod operation;
pub mod reply;

pub use error::{EncodingError, FrameError, ReplyError};
pub use frame::{FrameBuilder, FRAME_TERMINATOR};
pub use operation::Operation;
pub use reply::{Reply, ResponseMode, Status, REPLY_HEADER_LEN};

/// Largest content payload a single `write` may carry.
pub const MAX_CONTENT_LEN: usize = 16 * 1024 * 1024;

/// Largest text operand (operation name or path), excluding its NUL.
pub const MAX_TEXT_LEN: usize = 4096;

/// Upper bound on any request frame the encoder can produce.
pub const MAX_FRAME_LEN: usize = MAX_CONTENT_LEN + 3 * (MAX_TEXT_LEN + 1) + 1;

/// Default vsock context id of the host.
pub const HOST_CID: u32 = 2;

/// Default vsock port the agent listens on.
pub const AGENT_PORT: u32 = 52;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_bound_covers_largest_write() {
        let path = "p".repeat(MAX_TEXT_LEN);
        let op = Operation::Write {
            path,
            content: vec![0u8; MAX_CONTENT_LEN],
        };
        let frame = op.encode().unwrap();
        assert!(frame.len() <= MAX_FRAME_LEN);
    }

    #[test]
    fn test_error_display() {
        let err = EncodingError::EmbeddedNul { field: "path" };
        assert_eq!(err.to_string(), "path contains an embedded NUL byte");
    }
}
