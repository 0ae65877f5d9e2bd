//! Agent replies
//!
//! In [`ResponseMode::Framed`] every request is answered with a 5-byte
//! header (status byte, little-endian `u32` payload length) followed by the
//! payload. In [`ResponseMode::Legacy`] only `read` is answered, with the
//! raw file bytes and no framing at all.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ReplyError;

/// Size of the framed reply header.
pub const REPLY_HEADER_LEN: usize = 5;

/// How the agent answers requests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    /// Only `read` is answered, with unframed content.
    Legacy,
    /// Every request gets a status + length-prefixed reply.
    #[default]
    Framed,
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Legacy => f.write_str("legacy"),
            Self::Framed => f.write_str("framed"),
        }
    }
}

impl FromStr for ResponseMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Self::Legacy),
            "framed" => Ok(Self::Framed),
            other => Err(format!("unknown response mode: {other} (expected legacy or framed)")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0,
    Error = 1,
}

impl TryFrom<u8> for Status {
    type Error = ReplyError;

    fn try_from(value: u8) -> Result<Self, ReplyError> {
        match value {
            0 => Ok(Self::Ok),
            1 => Ok(Self::Error),
            other => Err(ReplyError::UnknownStatus(other)),
        }
    }
}

/// One framed reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub status: Status,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(payload: Vec<u8>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    pub fn ack() -> Self {
        Self::ok(Vec::new())
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            payload: message.into().into_bytes(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// Error text carried by an error reply.
    pub fn message(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Header plus payload. Fails when the payload length does not fit the
    /// 32-bit length field.
    pub fn encode(&self) -> Result<Vec<u8>, ReplyError> {
        let len = u32::try_from(self.payload.len()).map_err(|_| ReplyError::TooLarge {
            len: self.payload.len(),
            max: u32::MAX as usize,
        })?;
        let mut out = Vec::with_capacity(REPLY_HEADER_LEN + self.payload.len());
        out.push(self.status as u8);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    /// Parse a header into its status and declared payload length.
    pub fn decode_header(header: &[u8], max_payload: usize) -> Result<(Status, usize), ReplyError> {
        if header.len() != REPLY_HEADER_LEN {
            return Err(ReplyError::ShortHeader(header.len()));
        }
        let status = Status::try_from(header[0])?;
        let len = u32::from_le_bytes([header[1], header[2], header[3], header[4]]) as usize;
        if len > max_payload {
            return Err(ReplyError::TooLarge {
                len,
                max: max_payload,
            });
        }
        Ok((status, len))
    }

    /// Parse a complete reply held in memory.
    pub fn decode(data: &[u8], max_payload: usize) -> Result<Self, ReplyError> {
        let header = data.get(..REPLY_HEADER_LEN).ok_or(ReplyError::ShortHeader(data.len()))?;
        let (status, len) = Self::decode_header(header, max_payload)?;
        let payload = &data[REPLY_HEADER_LEN..];
        if payload.len() != len {
            return Err(ReplyError::LengthMismatch {
                declared: len,
                actual: payload.len(),
            });
        }
        Ok(Self {
            status,
            payload: payload.to_vec(),
        })
    }
}
