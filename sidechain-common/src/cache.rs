//! Generic keyed TTL cache facade.
//!
//! Wraps a [`moka`] async cache behind a small named-instance API so callers
//! don't each reach for `moka` directly and pick inconsistent capacities or
//! TTLs. Used by the ranker (author-record enrichment) and the hub
//! (presence snapshots).

use moka::future::Cache as MokaCache;
use std::hash::Hash;
use std::time::Duration;

/// A single keyed cache with a fixed capacity and time-to-live.
#[derive(Clone)]
pub struct KeyedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: MokaCache<K, V>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: MokaCache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    pub async fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).await
    }

    pub async fn insert(&self, key: K, value: V) {
        self.inner.insert(key, value).await;
    }

    pub async fn invalidate(&self, key: &K) {
        self.inner.invalidate(key).await;
    }

    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Fetches the cached value, or computes and caches it via `f` on a miss.
    pub async fn get_or_insert_with<F, Fut>(&self, key: K, f: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = V>,
    {
        if let Some(v) = self.inner.get(&key).await {
            return v;
        }
        let v = f().await;
        self.inner.insert(key, v.clone()).await;
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_insert_with_caches_on_miss() {
        let cache: KeyedCache<String, u32> = KeyedCache::new(100, Duration::from_secs(60));

        let v = cache
            .get_or_insert_with("k".to_string(), || async { 42 })
            .await;
        assert_eq!(v, 42);
        assert_eq!(cache.get(&"k".to_string()).await, Some(42));
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache: KeyedCache<String, u32> = KeyedCache::new(100, Duration::from_secs(60));
        cache.insert("k".to_string(), 1).await;
        cache.invalidate(&"k".to_string()).await;
        assert_eq!(cache.get(&"k".to_string()).await, None);
    }
}
