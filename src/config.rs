//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

// == Server Role ==
/// Replication role of a node, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerRole {
    /// Accepts writes and forwards them to followers
    Leader,
    /// Applies writes it receives; never forwards
    Follower,
}

impl ServerRole {
    pub fn is_leader(self) -> bool {
        self == ServerRole::Leader
    }
}

impl FromStr for ServerRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leader" => Ok(ServerRole::Leader),
            "follower" => Ok(ServerRole::Follower),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

impl fmt::Display for ServerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerRole::Leader => f.write_str("leader"),
            ServerRole::Follower => f.write_str("follower"),
        }
    }
}

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP listen address
    pub listen_addr: String,
    /// Replication role of this node
    pub role: ServerRole,
    /// Follower addresses the leader replicates to
    pub followers: Vec<String>,
    /// Number of independently locked cache shards
    pub shard_count: usize,
    /// Background cleanup task interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// Upper bound on commands executing at once across all connections
    pub max_inflight_commands: usize,
    /// Largest partial frame buffered before the connection is rejected
    pub max_frame_len: usize,
    /// Per-follower replication queue depth
    pub replication_queue: usize,
    /// Delivery attempts per replicated command
    pub replication_max_attempts: u32,
    /// Initial backoff between delivery attempts in milliseconds
    pub replication_backoff_ms: u64,
    /// Connect/write timeout for follower links in milliseconds
    pub replication_timeout_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `LISTEN_ADDR` - TCP listen address (default: 0.0.0.0:3000)
    /// - `ROLE` - `leader` or `follower` (default: leader)
    /// - `FOLLOWERS` - Comma-separated follower addresses (default: none)
    /// - `SHARD_COUNT` - Cache shards (default: 64)
    /// - `CLEANUP_INTERVAL_MS` - Cleanup frequency in milliseconds (default: 1000)
    /// - `MAX_INFLIGHT_COMMANDS` - Concurrent command bound (default: 1024)
    /// - `MAX_FRAME_LEN` - Maximum frame length in bytes (default: 65536)
    /// - `REPLICATION_QUEUE` - Per-follower queue depth (default: 1024)
    /// - `REPLICATION_MAX_ATTEMPTS` - Delivery attempts (default: 5)
    /// - `REPLICATION_BACKOFF_MS` - Initial retry backoff (default: 100)
    /// - `REPLICATION_TIMEOUT_MS` - Follower connect/write timeout (default: 1000)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from an arbitrary variable lookup.
    ///
    /// Missing or unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            listen_addr: lookup("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            role: parse_var(lookup("ROLE")).unwrap_or(defaults.role),
            followers: lookup("FOLLOWERS")
                .map(|v| parse_followers(&v))
                .unwrap_or(defaults.followers),
            shard_count: parse_var(lookup("SHARD_COUNT"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.shard_count),
            cleanup_interval_ms: parse_var(lookup("CLEANUP_INTERVAL_MS"))
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.cleanup_interval_ms),
            max_inflight_commands: parse_var(lookup("MAX_INFLIGHT_COMMANDS"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_inflight_commands),
            max_frame_len: parse_var(lookup("MAX_FRAME_LEN"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_frame_len),
            replication_queue: parse_var(lookup("REPLICATION_QUEUE"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.replication_queue),
            replication_max_attempts: parse_var(lookup("REPLICATION_MAX_ATTEMPTS"))
                .filter(|n: &u32| *n > 0)
                .unwrap_or(defaults.replication_max_attempts),
            replication_backoff_ms: parse_var(lookup("REPLICATION_BACKOFF_MS"))
                .unwrap_or(defaults.replication_backoff_ms),
            replication_timeout_ms: parse_var(lookup("REPLICATION_TIMEOUT_MS"))
                .filter(|n: &u64| *n > 0)
                .unwrap_or(defaults.replication_timeout_ms),
        }
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_millis(self.cleanup_interval_ms)
    }
}

fn parse_var<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.trim().parse().ok())
}

fn parse_followers(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|addr| !addr.is_empty())
        .map(str::to_string)
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:3000".to_string(),
            role: ServerRole::Leader,
            followers: Vec::new(),
            shard_count: 64,
            cleanup_interval_ms: 1000,
            max_inflight_commands: 1024,
            max_frame_len: 64 * 1024,
            replication_queue: 1024,
            replication_max_attempts: 5,
            replication_backoff_ms: 100,
            replication_timeout_ms: 1000,
        }
    }
}
