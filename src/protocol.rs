//! Wire framing between relay server and client.
//!
//! Requests are newline-terminated UTF-8 lines. Every response is arbitrary
//! text followed by [`END_MARKER`], so multi-line tables travel as a single
//! message.
//!
//! ```text
//! client ── "/repos\n" ─────────────────────────────▶ server
//! client ◀─ "<table>\n<<END_OF_MESSAGE>>\n" ───────── server
//! ```

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Sentinel appended to every server response
pub const END_MARKER: &str = "\n<<END_OF_MESSAGE>>\n";

/// Longest request line the server accepts, not counting `\r\n` or `\n`.
pub const MAX_LINE_LENGTH: usize = 8 * 1024;

/// Largest response the client buffers before giving up.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("Response exceeds {limit} bytes")]
    MessageTooLong { limit: usize },
}

/// Server side: decodes request lines, encodes sentinel-framed responses
#[derive(Debug, Default)]
pub struct ServerCodec {
    // Bytes already scanned for a newline
    next_index: usize,
}

impl ServerCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ServerCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        let newline = src[self.next_index..].iter().position(|&b| b == b'\n');

        match newline {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let content = if src[..end].ends_with(b"\r") { end - 1 } else { end };
                if content > MAX_LINE_LENGTH {
                    return Err(ProtocolError::LineTooLong { limit: MAX_LINE_LENGTH });
                }
                let line = src.split_to(end + 1);
                Ok(Some(decode_text(without_line_ending(&line))))
            },
            // One spare byte for a `\r` still waiting on its `\n`
            None if src.len() > MAX_LINE_LENGTH + 1 => {
                Err(ProtocolError::LineTooLong { limit: MAX_LINE_LENGTH })
            },
            None => {
                self.next_index = src.len();
                Ok(None)
            },
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        // Peer closed mid-line; hand over what arrived.
        let rest = src.split();
        Ok(Some(decode_text(without_line_ending(&rest))))
    }
}

impl<T: AsRef<str>> Encoder<T> for ServerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, message: T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let message = message.as_ref();
        dst.reserve(message.len() + END_MARKER.len());
        dst.put_slice(message.as_bytes());
        dst.put_slice(END_MARKER.as_bytes());
        Ok(())
    }
}

/// Client side: decodes sentinel-framed responses, encodes request lines
#[derive(Debug, Default)]
pub struct ClientCodec {
    next_index: usize,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for ClientCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        let marker = END_MARKER.as_bytes();
        let found = src[self.next_index..]
            .windows(marker.len())
            .position(|window| window == marker);

        match found {
            Some(offset) => {
                let end = self.next_index + offset;
                self.next_index = 0;
                let frame = src.split_to(end + marker.len());
                Ok(Some(decode_text(&frame[..end])))
            },
            None if src.len() > MAX_MESSAGE_SIZE => {
                Err(ProtocolError::MessageTooLong { limit: MAX_MESSAGE_SIZE })
            },
            None => {
                // The marker may straddle the next read.
                self.next_index = src.len().saturating_sub(marker.len() - 1);
                Ok(None)
            },
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(message) = self.decode(src)? {
            return Ok(Some(message));
        }
        self.next_index = 0;
        if src.is_empty() {
            return Ok(None);
        }
        let rest = src.split();
        Ok(Some(decode_text(&rest)))
    }
}

impl<T: AsRef<str>> Encoder<T> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = line.as_ref();
        dst.reserve(line.len() + 1);
        dst.put_slice(line.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

fn without_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn decode_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
