//! Frame Codec Module
//!
//! Splits a byte stream into newline-delimited frames and serializes replies.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{CacheError, Result};

// == Frame Decoder ==
/// Reassembles frames that arrive split across reads.
///
/// Bytes accumulate in the caller's buffer until a `\n` arrives; an optional
/// `\r` before it is dropped. Blank lines are skipped. One decoder belongs to
/// one buffer: it remembers how much of the unterminated tail it has already
/// searched, so a frame trickling in is scanned once.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    max_frame_len: usize,
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            max_frame_len,
            scanned: 0,
        }
    }

    /// Takes the next complete frame out of `buf`.
    ///
    /// Returns `Ok(None)` when more bytes are needed, and
    /// `CacheError::FrameTooLarge` once the unterminated tail of `buf`
    /// exceeds the limit.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            let start = self.scanned.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') else {
                self.scanned = buf.len();
                if buf.len() > self.max_frame_len {
                    return Err(CacheError::FrameTooLarge {
                        limit: self.max_frame_len,
                    });
                }
                return Ok(None);
            };

            let pos = start + offset;
            self.scanned = 0;

            if pos > self.max_frame_len {
                return Err(CacheError::FrameTooLarge {
                    limit: self.max_frame_len,
                });
            }

            let mut line = buf.split_to(pos);
            buf.advance(1);

            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            return Ok(Some(line.freeze()));
        }
    }

    /// Takes whatever is left in `buf` as a final, unterminated frame.
    ///
    /// Used once the peer has closed its side.
    pub fn decode_eof(&mut self, buf: &mut BytesMut) -> Option<Bytes> {
        self.scanned = 0;
        let rest = buf.split();
        if rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(rest.freeze())
        }
    }
}

// == Reply ==
/// A single reply line written back to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Raw value bytes of a successful GET
    Value(Bytes),
    /// Human-readable error text
    Error(String),
}

impl Reply {
    pub fn error(err: &CacheError) -> Self {
        Reply::Error(err.to_string())
    }

    /// Serializes the reply as one newline-terminated line.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Reply::Value(value) => buf.put_slice(value),
            Reply::Error(message) => {
                // Keep the reply on a single line whatever the message holds
                let text = message.lines().collect::<Vec<_>>().join(" ");
                buf.put_slice(b"ERR ");
                buf.put_slice(text.as_bytes());
            }
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }
}
