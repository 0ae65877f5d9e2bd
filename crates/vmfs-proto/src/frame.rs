//! Typed field builder and reader for request frames

use crate::error::{EncodingError, FrameError};
use crate::{MAX_CONTENT_LEN, MAX_TEXT_LEN};

/// Single byte that closes every request frame.
pub const FRAME_TERMINATOR: u8 = b'\r';

/// Growable request frame.
///
/// Text fields are appended with their NUL terminator, raw content is
/// appended verbatim. The builder never writes past its backing storage;
/// it grows instead.
#[derive(Debug, Default, Clone)]
pub struct FrameBuilder {
    buf: Vec<u8>,
}

impl FrameBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append a NUL-terminated text field.
    pub fn text(&mut self, field: &'static str, value: &str) -> Result<&mut Self, EncodingError> {
        let bytes = value.as_bytes();
        if bytes.is_empty() {
            return Err(EncodingError::EmptyField { field });
        }
        if bytes.len() > MAX_TEXT_LEN {
            return Err(EncodingError::FieldTooLong {
                field,
                len: bytes.len(),
                max: MAX_TEXT_LEN,
            });
        }
        if bytes.contains(&0) {
            return Err(EncodingError::EmbeddedNul { field });
        }
        self.buf.extend_from_slice(bytes);
        self.buf.push(0);
        Ok(self)
    }

    /// Append raw content. Must be the last variable-length field.
    pub fn raw(&mut self, content: &[u8]) -> Result<&mut Self, EncodingError> {
        if content.len() > MAX_CONTENT_LEN {
            return Err(EncodingError::ContentTooLarge {
                len: content.len(),
                max: MAX_CONTENT_LEN,
            });
        }
        self.buf.extend_from_slice(content);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Close the frame with the terminator byte.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.push(FRAME_TERMINATOR);
        self.buf
    }
}

/// Cursor over a received frame.
pub(crate) struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    /// Next NUL-terminated text field.
    pub(crate) fn text(
        &mut self,
        operation: &'static str,
        field: &'static str,
    ) -> Result<String, FrameError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .position(|b| *b == 0)
            .ok_or(FrameError::MissingField { operation, field })?;
        if end == 0 {
            return Err(FrameError::EmptyField { field });
        }
        let value = std::str::from_utf8(&rest[..end])
            .map_err(|_| FrameError::InvalidUtf8 { field })?
            .to_owned();
        self.pos += end + 1;
        Ok(value)
    }

    /// Consume the terminator that must directly follow the last text field.
    pub(crate) fn terminator(&mut self) -> Result<(), FrameError> {
        match self.buf.get(self.pos) {
            None => Err(FrameError::MissingTerminator),
            Some(&FRAME_TERMINATOR) => {
                self.pos += 1;
                Ok(())
            }
            Some(_) => Err(FrameError::TrailingBytes(self.buf.len() - self.pos)),
        }
    }

    /// Raw content up to the terminator that closes this frame.
    ///
    /// That terminator is the first `\r` which is either the last byte of the
    /// buffer or directly followed by the start of another frame. A `\r` in
    /// last position only counts when `settled` says no more bytes follow.
    pub(crate) fn content(
        &mut self,
        starts_frame: impl Fn(&[u8]) -> bool,
        settled: bool,
    ) -> Result<Vec<u8>, FrameError> {
        let rest = &self.buf[self.pos..];
        let end = rest
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == FRAME_TERMINATOR)
            .map(|(i, _)| i)
            .find(|&i| i + 1 == rest.len() || starts_frame(&rest[i + 1..]))
            .ok_or(FrameError::MissingTerminator)?;
        if end + 1 == rest.len() && !settled {
            return Err(FrameError::Unsettled);
        }
        let content = rest[..end].to_vec();
        self.pos += end + 1;
        Ok(content)
    }
}
