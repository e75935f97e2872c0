//! ggcache - A TTL key-value cache server
//!
//! Serves `SET`/`GET` over a line-oriented TCP protocol. A leader node
//! forwards every successful `SET` to its followers.

pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod replication;
pub mod server;
pub mod tasks;

pub use cache::{CacheStore, Cacher};
pub use config::{Config, ServerRole};
pub use error::{CacheError, Result};
pub use protocol::{Command, Reply};
pub use replication::{FollowerSet, NoopReplicator, ReplicationOptions, Replicator};
pub use server::{Server, ServerLimits};
pub use tasks::spawn_cleanup_task;
