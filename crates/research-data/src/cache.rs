//! Caching layer for vendor payloads to reduce API calls

use std::sync::Arc;
use std::time::Duration;

use cached::{Cached, TimedCache};
use research_core::{DataSourceKind, Payload};
use tokio::sync::RwLock;

/// Default lifetime of a cached payload
pub const DEFAULT_SNAPSHOT_TTL: Duration = Duration::from_secs(300); // 5 minutes

/// Cache key: one payload per (source, symbol)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: DataSourceKind,
    pub symbol: String,
}

impl CacheKey {
    pub fn new(source: DataSourceKind, symbol: &str) -> Self {
        Self {
            source,
            symbol: symbol.trim().to_uppercase(),
        }
    }
}

/// Thread-safe TTL cache for successful vendor payloads
///
/// Clones share the same underlying storage.
#[derive(Clone)]
pub struct SnapshotCache {
    cache: Arc<RwLock<TimedCache<CacheKey, Payload>>>,
}

impl SnapshotCache {
    /// Create a new cache with specified TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            cache: Arc::new(RwLock::new(TimedCache::with_lifespan(ttl))),
        }
    }

    /// Get a value from the cache
    pub async fn get(&self, key: &CacheKey) -> Option<Payload> {
        // TimedCache evicts on read, so even lookups need the write lock
        let mut cache = self.cache.write().await;
        cache.cache_get(key).cloned()
    }

    /// Insert a value into the cache
    pub async fn insert(&self, key: CacheKey, value: Payload) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_set(key, value);
    }

    /// Invalidate a specific cache entry
    pub async fn invalidate(&self, key: &CacheKey) {
        let mut cache = self.cache.write().await;
        let _ = cache.cache_remove(key);
    }

    /// Clear all cached entries
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.cache_clear();
    }

    /// Get the number of cached entries
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.cache_size()
    }

    /// Check if the cache is empty
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SnapshotCache {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Payload {
        Payload::from([("current_price".to_string(), json!(189.5))])
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let cache = SnapshotCache::default();
        let key = CacheKey::new(DataSourceKind::YahooFinance, "aapl ");

        assert!(cache.get(&key).await.is_none());
        cache.insert(key.clone(), payload()).await;

        let hit = cache
            .get(&CacheKey::new(DataSourceKind::YahooFinance, "AAPL"))
            .await;
        assert_eq!(hit, Some(payload()));
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_keys_are_per_source() {
        let cache = SnapshotCache::default();
        cache
            .insert(CacheKey::new(DataSourceKind::YahooFinance, "AAPL"), payload())
            .await;

        assert!(cache
            .get(&CacheKey::new(DataSourceKind::AlphaVantage, "AAPL"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = SnapshotCache::new(Duration::from_millis(20));
        let key = CacheKey::new(DataSourceKind::Fred, "AAPL");
        cache.insert(key.clone(), payload()).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_and_invalidate() {
        let cache = SnapshotCache::default();
        let key = CacheKey::new(DataSourceKind::SecEdgar, "AAPL");
        cache.insert(key.clone(), payload()).await;
        cache.invalidate(&key).await;
        assert!(cache.is_empty().await);

        cache.insert(key, payload()).await;
        cache.clear().await;
        assert!(cache.is_empty().await);
    }
}
