//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Frame could not be parsed into a command
    #[error("parse error in {command:?} at token {token:?}: {reason}")]
    Parse {
        command: String,
        token: String,
        reason: String,
    },

    /// Key not found in cache, or its entry has expired
    #[error("not found: {0}")]
    NotFound(String),

    /// Key is structurally invalid (empty)
    #[error("invalid key: key must not be empty")]
    InvalidKey,

    /// Buffered partial frame exceeded the configured limit
    #[error("frame exceeds {limit} bytes without a line terminator")]
    FrameTooLarge { limit: usize },

    /// Transport-level failure on a client connection
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Follower could not be reached or did not accept a write in time
    #[error("replication to {addr} failed: {reason}")]
    Replication { addr: String, reason: String },
}

impl CacheError {
    /// Builds a parse error for `command`, pointing at `token`.
    pub fn parse(command: &str, token: &str, reason: impl Into<String>) -> Self {
        CacheError::Parse {
            command: command.to_string(),
            token: token.to_string(),
            reason: reason.into(),
        }
    }

    /// Returns true for errors that are reported to the client while the
    /// connection stays open.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CacheError::Parse { .. } | CacheError::NotFound(_) | CacheError::InvalidKey
        )
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
