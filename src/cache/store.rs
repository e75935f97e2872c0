//! Cache Store Module
//!
//! Main cache engine: a fixed set of independently locked shards holding
//! TTL-stamped entries.

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::RwLock;

use crate::cache::{CacheEntry, CacheStats, Cacher, StatsSnapshot};
use crate::error::{CacheError, Result};

type Shard = RwLock<HashMap<String, CacheEntry>>;

// == Cache Store ==
/// Sharded in-memory cache with lazy and swept TTL expiration.
///
/// A key always maps to the same shard, so operations on one key serialize
/// on that shard's lock while keys in other shards proceed independently.
/// No lock is ever held across an `.await` on anything but the lock itself.
#[derive(Debug)]
pub struct CacheStore {
    shards: Box<[Shard]>,
    hasher: RandomState,
    stats: CacheStats,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore split across `shard_count` shards.
    ///
    /// A shard count of zero is bumped to one.
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();

        Self {
            shards,
            hasher: RandomState::new(),
            stats: CacheStats::new(),
        }
    }

    fn shard(&self, key: &str) -> &Shard {
        let index = self.hasher.hash_one(key) as usize % self.shards.len();
        &self.shards[index]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    // == Set ==
    /// Stores a key-value pair, replacing any prior entry for the key.
    ///
    /// # Arguments
    /// * `key` - The key to store, must not be empty
    /// * `value` - The value to store
    /// * `ttl` - Time to live, zero for no expiration
    pub async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        if key.is_empty() {
            return Err(CacheError::InvalidKey);
        }

        let entry = CacheEntry::new(value, ttl);
        self.shard(key).write().await.insert(key.to_string(), entry);
        self.stats.record_set();

        Ok(())
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if found and not expired. An expired entry is
    /// removed as a side effect and reported as not found.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let shard = self.shard(key);

        {
            let entries = shard.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => {
                    self.stats.record_hit();
                    return Ok(entry.value.clone());
                }
                Some(_) => {}
                None => {
                    self.stats.record_miss();
                    return Err(CacheError::NotFound(key.to_string()));
                }
            }
        }

        // Re-check under the write lock: a SET may have replaced the entry
        // between dropping the read guard and getting here.
        let mut entries = shard.write().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.stats.record_hit();
                Ok(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key);
                self.stats.record_expired(1);
                self.stats.record_miss();
                Err(CacheError::NotFound(key.to_string()))
            }
            None => {
                self.stats.record_miss();
                Err(CacheError::NotFound(key.to_string()))
            }
        }
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, locking one shard at a time.
    ///
    /// Returns the number of entries removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut removed = 0;

        for shard in self.shards.iter() {
            let mut entries = shard.write().await;
            let now = Instant::now();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            removed += before - entries.len();
        }

        self.stats.record_expired(removed as u64);
        removed
    }

    // == Length ==
    /// Returns the number of entries physically held, including expired
    /// entries not yet reclaimed.
    pub async fn len(&self) -> usize {
        let mut total = 0;
        for shard in self.shards.iter() {
            total += shard.read().await.len();
        }
        total
    }

    // == Is Empty ==
    /// Returns true if the cache holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub async fn stats(&self) -> StatsSnapshot {
        let total = self.len().await;
        self.stats.snapshot(total)
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(crate::cache::DEFAULT_SHARD_COUNT)
    }
}

#[async_trait]
impl Cacher for CacheStore {
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> Result<()> {
        CacheStore::set(self, key, value, ttl).await
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        CacheStore::get(self, key).await
    }
}
