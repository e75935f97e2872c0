//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries that are
//! never looked up again.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::CacheStore;

/// Spawns a background task that periodically cleans up expired cache entries.
///
/// The task runs in an infinite loop, sleeping for the specified interval
/// between cleanup runs. Each run locks one shard at a time, so lookups on
/// other shards are never held up by the sweep.
///
/// # Arguments
/// * `cache` - Shared reference to the cache store
/// * `interval` - Time between cleanup runs
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(CacheStore::new(64));
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(cache: Arc<CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "starting TTL cleanup task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.cleanup_expired().await;

            if removed > 0 {
                let stats = cache.stats().await;
                info!(
                    removed,
                    remaining = stats.total_entries,
                    hit_rate = stats.hit_rate(),
                    "TTL cleanup removed expired entries"
                );
            } else {
                debug!("TTL cleanup: no expired entries found");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = Arc::new(CacheStore::new(8));

        cache
            .set("expire_soon", Bytes::from_static(b"value"), Duration::from_millis(50))
            .await
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(100));

        tokio::time::sleep(Duration::from_millis(350)).await;

        // Reclaimed without ever being looked up
        assert_eq!(cache.len().await, 0, "Expired entry should have been cleaned up");
        assert_eq!(cache.stats().await.expired, 1);

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = Arc::new(CacheStore::new(8));

        cache
            .set("long_lived", Bytes::from_static(b"value"), Duration::from_secs(3600))
            .await
            .unwrap();
        cache
            .set("forever", Bytes::from_static(b"value"), Duration::ZERO)
            .await
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), Duration::from_millis(50));

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.len().await, 2, "Valid entries should not be removed");
        assert_eq!(cache.get("long_lived").await.unwrap(), Bytes::from_static(b"value"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let cache = Arc::new(CacheStore::new(8));

        let handle = spawn_cleanup_task(cache, Duration::from_secs(1));

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
