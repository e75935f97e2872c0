//! Command Module
//!
//! Typed commands and the parser for the text grammar:
//!
//! ```text
//! SET <key> <value> <ttl_nanoseconds>
//! GET <key>
//! ```

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CacheError, Result};

// == Command ==
/// A fully parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Set {
        key: String,
        value: Bytes,
        ttl: Duration,
    },
    Get {
        key: String,
    },
}

impl Command {
    /// Returns the verb as it appears on the wire.
    pub fn verb(&self) -> &'static str {
        match self {
            Command::Set { .. } => "SET",
            Command::Get { .. } => "GET",
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Command::Set { key, .. } | Command::Get { key } => key,
        }
    }

    /// True for commands that change cache state and must be replicated.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Command::Set { .. })
    }

    // == Encode ==
    /// Serializes the command back into one newline-terminated frame.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Command::Set { key, value, ttl } => {
                buf.put_slice(b"SET ");
                buf.put_slice(key.as_bytes());
                buf.put_u8(b' ');
                buf.put_slice(value);
                buf.put_u8(b' ');
                buf.put_slice(ttl.as_nanos().to_string().as_bytes());
            }
            Command::Get { key } => {
                buf.put_slice(b"GET ");
                buf.put_slice(key.as_bytes());
            }
        }
        buf.put_u8(b'\n');
        buf.freeze()
    }
}

// == Parse ==
/// Parses a single frame (without its line terminator) into a Command.
///
/// The verb is case-sensitive. Every failure names the command text and the
/// offending token.
pub fn parse_command(frame: &[u8]) -> Result<Command> {
    let text = std::str::from_utf8(frame).map_err(|_| {
        CacheError::parse(
            &String::from_utf8_lossy(frame),
            "",
            "frame is not valid UTF-8",
        )
    })?;

    let tokens: Vec<&str> = text.split_ascii_whitespace().collect();
    let Some(&verb) = tokens.first() else {
        return Err(CacheError::parse(text, "", "empty command"));
    };

    match verb {
        "SET" => {
            expect_arity(text, &tokens, 4)?;
            let ttl = parse_ttl(text, tokens[3])?;
            Ok(Command::Set {
                key: tokens[1].to_string(),
                value: Bytes::copy_from_slice(tokens[2].as_bytes()),
                ttl,
            })
        }
        "GET" => {
            expect_arity(text, &tokens, 2)?;
            Ok(Command::Get {
                key: tokens[1].to_string(),
            })
        }
        other => Err(CacheError::parse(text, other, "unknown command")),
    }
}

fn expect_arity(text: &str, tokens: &[&str], expected: usize) -> Result<()> {
    if tokens.len() == expected {
        return Ok(());
    }

    // Point at the first surplus token, or at the verb when tokens are missing
    let token = tokens.get(expected).unwrap_or(&tokens[0]);
    Err(CacheError::parse(
        text,
        token,
        format!(
            "{} expects {} arguments, got {}",
            tokens[0],
            expected - 1,
            tokens.len() - 1
        ),
    ))
}

fn parse_ttl(text: &str, token: &str) -> Result<Duration> {
    token
        .parse::<u64>()
        .map(Duration::from_nanos)
        .map_err(|_| CacheError::parse(text, token, "ttl must be a non-negative integer"))
}
