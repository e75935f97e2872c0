//! Replication Module
//!
//! Leader-side forwarding of mutating commands to followers.
//!
//! Replication is fire-and-forget with respect to clients: `replicate` only
//! enqueues, and delivery happens on per-follower background tasks. Delivery
//! is at-least-once within a retry budget; replaying a SET only rewrites the
//! same value, so no deduplication is needed. TTLs travel as the original
//! relative duration and each follower computes its own deadline on receipt.

mod follower;

use std::time::Duration;

use crate::config::Config;
use crate::protocol::Command;

pub use follower::FollowerSet;

// == Replicator ==
/// Sink for successfully applied mutating commands.
///
/// Implementations must return immediately; they are called on the request
/// path.
pub trait Replicator: Send + Sync + 'static {
    fn replicate(&self, command: &Command);
}

// == No-op Replicator ==
/// Replicator for followers and for leaders without followers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReplicator;

impl Replicator for NoopReplicator {
    fn replicate(&self, _command: &Command) {}
}

// == Replication Options ==
/// Tuning for follower links.
#[derive(Debug, Clone)]
pub struct ReplicationOptions {
    /// Commands buffered per follower before new ones are dropped
    pub queue_depth: usize,
    /// Delivery attempts per command
    pub max_attempts: u32,
    /// Initial delay between attempts, doubled up to `MAX_BACKOFF`
    pub backoff: Duration,
    /// Connect and write timeout
    pub timeout: Duration,
}

/// Ceiling for the retry backoff.
pub const MAX_BACKOFF: Duration = Duration::from_secs(5);

impl ReplicationOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queue_depth: config.replication_queue,
            max_attempts: config.replication_max_attempts,
            backoff: Duration::from_millis(config.replication_backoff_ms),
            timeout: Duration::from_millis(config.replication_timeout_ms),
        }
    }
}

impl Default for ReplicationOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = Config {
            replication_queue: 8,
            replication_max_attempts: 3,
            replication_backoff_ms: 25,
            replication_timeout_ms: 500,
            ..Config::default()
        };

        let options = ReplicationOptions::from_config(&config);
        assert_eq!(options.queue_depth, 8);
        assert_eq!(options.max_attempts, 3);
        assert_eq!(options.backoff, Duration::from_millis(25));
        assert_eq!(options.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_noop_replicator_accepts_anything() {
        let replicator = NoopReplicator;
        replicator.replicate(&Command::Get { key: "k".to_string() });
    }
}
