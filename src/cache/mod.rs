//! Cache Module
//!
//! Provides the concurrent in-memory cache engine with TTL expiration.

mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsSnapshot};
pub use store::CacheStore;

// == Public Constants ==
/// Shard count used by `CacheStore::default()`
pub const DEFAULT_SHARD_COUNT: usize = 64;

// == Cacher ==
/// The narrow capability the dispatcher needs from a cache backend.
///
/// `CacheStore` is the in-memory implementation; anything else that can
/// store and look up TTL-stamped values can be plugged into the server.
#[async_trait]
pub trait Cacher: Send + Sync + 'static {
    /// Stores `value` under `key`, replacing any prior value.
    ///
    /// A zero `ttl` means the entry never expires. Fails only on a
    /// structurally invalid key.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()>;

    /// Returns the live value for `key`, or `CacheError::NotFound`.
    async fn get(&self, key: &str) -> Result<Bytes>;
}
