//! Command Dispatcher
//!
//! Turns one decoded frame into cache calls and, on a leader, replication.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::Cacher;
use crate::config::ServerRole;
use crate::error::Result;
use crate::protocol::{parse_command, Command, Reply};
use crate::replication::Replicator;

/// Shared, immutable dispatch state used by every command task.
#[derive(Clone)]
pub struct Dispatcher {
    role: ServerRole,
    cache: Arc<dyn Cacher>,
    replicator: Arc<dyn Replicator>,
}

impl Dispatcher {
    pub fn new(role: ServerRole, cache: Arc<dyn Cacher>, replicator: Arc<dyn Replicator>) -> Self {
        Self {
            role,
            cache,
            replicator,
        }
    }

    pub fn role(&self) -> ServerRole {
        self.role
    }

    /// Parses and executes one frame.
    ///
    /// Returns the reply to write back, or `None` for a successful SET.
    /// Parse and cache errors become error replies; nothing here closes the
    /// connection.
    pub async fn dispatch(&self, frame: &[u8]) -> Option<Reply> {
        let command = match parse_command(frame) {
            Ok(command) => command,
            Err(err) => {
                warn!(error = %err, "failed to parse command");
                return Some(Reply::error(&err));
            }
        };

        match self.execute(&command).await {
            Ok(reply) => reply,
            Err(err) => {
                if err.is_recoverable() {
                    debug!(verb = command.verb(), key = command.key(), error = %err, "command failed");
                } else {
                    warn!(verb = command.verb(), key = command.key(), error = %err, "command failed");
                }
                Some(Reply::error(&err))
            }
        }
    }

    /// Executes a parsed command against the cache.
    ///
    /// A successful SET on a leader is handed to the replicator, which only
    /// enqueues, so the caller is never held up by follower I/O.
    pub async fn execute(&self, command: &Command) -> Result<Option<Reply>> {
        match command {
            Command::Set { key, value, ttl } => {
                self.cache.set(key, value.clone(), *ttl).await?;
                if self.role.is_leader() {
                    self.replicator.replicate(command);
                }
                Ok(None)
            }
            Command::Get { key } => {
                let value = self.cache.get(key).await?;
                Ok(Some(Reply::Value(value)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use bytes::Bytes;

    use crate::cache::CacheStore;
    use crate::error::CacheError;

    #[derive(Default)]
    struct RecordingReplicator {
        seen: Mutex<Vec<Command>>,
    }

    impl Replicator for RecordingReplicator {
        fn replicate(&self, command: &Command) {
            self.seen.lock().unwrap().push(command.clone());
        }
    }

    fn dispatcher(role: ServerRole) -> (Dispatcher, Arc<RecordingReplicator>) {
        let replicator = Arc::new(RecordingReplicator::default());
        let dispatcher = Dispatcher::new(role, Arc::new(CacheStore::new(8)), replicator.clone());
        (dispatcher, replicator)
    }

    #[tokio::test]
    async fn test_set_is_silent_and_get_returns_value() {
        let (dispatcher, _) = dispatcher(ServerRole::Leader);

        assert_eq!(dispatcher.dispatch(b"SET Foo Bar 0").await, None);
        assert_eq!(
            dispatcher.dispatch(b"GET Foo").await,
            Some(Reply::Value(Bytes::from_static(b"Bar")))
        );
    }

    #[tokio::test]
    async fn test_get_miss_is_error_reply() {
        let (dispatcher, _) = dispatcher(ServerRole::Leader);

        let reply = dispatcher.dispatch(b"GET missing").await;
        assert_eq!(reply, Some(Reply::Error("not found: missing".to_string())));
    }

    #[tokio::test]
    async fn test_parse_error_is_error_reply() {
        let (dispatcher, replicator) = dispatcher(ServerRole::Leader);

        match dispatcher.dispatch(b"FOO a").await {
            Some(Reply::Error(message)) => assert!(message.contains("FOO")),
            other => panic!("expected error reply, got {other:?}"),
        }
        assert!(replicator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_leader_replicates_successful_set() {
        let (dispatcher, replicator) = dispatcher(ServerRole::Leader);

        dispatcher.dispatch(b"SET k v 0").await;
        dispatcher.dispatch(b"GET k").await;

        let seen = replicator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].encode(), Bytes::from_static(b"SET k v 0\n"));
    }

    #[tokio::test]
    async fn test_follower_does_not_replicate() {
        let (dispatcher, replicator) = dispatcher(ServerRole::Follower);

        dispatcher.dispatch(b"SET k v 0").await;

        assert_eq!(dispatcher.role(), ServerRole::Follower);
        assert!(replicator.seen.lock().unwrap().is_empty());
        assert!(dispatcher.dispatch(b"GET k").await.is_some());
    }

    #[tokio::test]
    async fn test_failed_set_is_not_replicated() {
        let (dispatcher, replicator) = dispatcher(ServerRole::Leader);

        let command = Command::Set {
            key: String::new(),
            value: Bytes::from_static(b"v"),
            ttl: Duration::ZERO,
        };
        let result = dispatcher.execute(&command).await;

        assert!(matches!(result, Err(CacheError::InvalidKey)));
        assert!(replicator.seen.lock().unwrap().is_empty());
    }
}
