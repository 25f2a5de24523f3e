//! Line codec for the control and telemetry channels
//!
//! All messages are framed as:
//! ```text
//! TYPE|LLLL|PAYLOAD\n
//! ```
//!
//! `LLLL` is the zero-padded decimal byte length of the payload. The newline
//! is what delimits a message; the length field is advisory and is never
//! checked against the payload that actually arrived.

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::defaults::MAX_LINE_LEN;
use crate::MessageType;

/// Errors that can occur while framing the control stream
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Line too long: {0} bytes without terminator (max: {1})")]
    LineTooLong(usize, usize),
}

/// One decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub msg_type: String,
    pub payload: String,
}

impl Message {
    pub fn new(msg_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: payload.into(),
        }
    }

    /// Typed view of the type token, `None` when unknown
    pub fn kind(&self) -> Option<MessageType> {
        MessageType::parse(&self.msg_type)
    }

    /// Encode this message for the wire
    pub fn encode(&self) -> Bytes {
        encode(&self.msg_type, &self.payload)
    }
}

/// Encode a message as `type|LLLL|payload\n`
pub fn encode(msg_type: &str, payload: &str) -> Bytes {
    let header = format!("{}|{:04}|", msg_type, payload.len());
    let mut buf = BytesMut::with_capacity(header.len() + payload.len() + 1);
    buf.put_slice(header.as_bytes());
    buf.put_slice(payload.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

/// Encode a message from its typed kind
pub fn encode_kind(kind: MessageType, payload: &str) -> Bytes {
    encode(kind.as_str(), payload)
}

/// Decode one message
///
/// Never fails: missing fields come back empty. The type is the text before
/// the first `|`, the payload is the text after the second `|` up to the
/// first newline (or end of input). With a single `|` everything after it is
/// taken as payload.
pub fn decode(bytes: &[u8]) -> Message {
    let text = String::from_utf8_lossy(bytes);
    let line = match text.find('\n') {
        Some(end) => &text[..end],
        None => &text[..],
    };

    let Some((msg_type, rest)) = line.split_once('|') else {
        return Message::default();
    };

    let payload = match rest.split_once('|') {
        Some((_declared_len, payload)) => payload,
        None => rest,
    };

    Message::new(msg_type, payload)
}

/// Decoder state machine for streaming decoding of newline-framed messages
#[derive(Debug)]
pub struct LineDecoder {
    /// Partial line data being accumulated
    buffer: BytesMut,
    max_line_len: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LineDecoder {
    /// Create a decoder with the default line limit
    pub fn new() -> Self {
        Self::with_max_line_len(MAX_LINE_LEN)
    }

    pub fn with_max_line_len(max_line_len: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(max_line_len + 1),
            max_line_len,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Take the next complete line from the buffer, terminator stripped
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete lines
    pub fn next_line(&mut self) -> Result<Option<String>, CodecError> {
        match self.buffer.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                let line = self.buffer.split_to(pos + 1);
                let mut end = pos;
                if end > 0 && line[end - 1] == b'\r' {
                    end -= 1;
                }
                Ok(Some(String::from_utf8_lossy(&line[..end]).into_owned()))
            }
            None if self.buffer.len() > self.max_line_len => Err(CodecError::LineTooLong(
                self.buffer.len(),
                self.max_line_len,
            )),
            None => Ok(None),
        }
    }

    /// Try to decode the next message from the buffer
    pub fn decode_next(&mut self) -> Result<Option<Message>, CodecError> {
        Ok(self.next_line()?.map(|line| decode(line.as_bytes())))
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}
