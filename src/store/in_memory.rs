//! In-memory store implementation using moka
//!
//! Useful for tests and single-process deployments. Entries carry their own
//! logical expiry so per-write TTLs behave like the Redis backend, and the
//! atomic create goes through moka's entry API so two racing callers never
//! both observe a successful create.

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;

use crate::error::CacheError;
use crate::store::Store;

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct InMemoryStoreConfig {
    /// Maximum number of entries before eviction
    pub max_capacity: u64,
}

impl Default for InMemoryStoreConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
        }
    }
}

impl InMemoryStoreConfig {
    /// Sets the maximum capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }
}

/// Entry stored in moka
#[derive(Debug, Clone)]
struct StoreEntry {
    data: String,
    /// Expiration timestamp (millis since epoch)
    expires_at: u64,
}

/// Thread-safe in-memory store implementation using moka
#[derive(Debug)]
pub struct InMemoryStore {
    cache: MokaCache<String, StoreEntry>,
}

impl InMemoryStore {
    /// Creates a new in-memory store with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryStoreConfig::default())
    }

    /// Creates a new in-memory store with the given configuration
    pub fn with_config(config: InMemoryStoreConfig) -> Self {
        Self {
            cache: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
        }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &StoreEntry) -> bool {
        Self::current_time_millis() > entry.expires_at
    }

    fn entry_for(value: &str, ttl: Duration) -> StoreEntry {
        StoreEntry {
            data: value.to_string(),
            expires_at: Self::current_time_millis() + ttl.as_millis() as u64,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if Self::is_expired(&entry) {
                    self.cache.remove(key).await;
                    return Ok(None);
                }

                Ok(Some(entry.data.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        self.cache
            .insert(key.to_string(), Self::entry_for(value, ttl))
            .await;
        Ok(())
    }

    async fn set_nx_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        // A logically expired entry counts as absent and may be replaced.
        let entry = self
            .cache
            .entry(key.to_string())
            .or_insert_with_if(
                std::future::ready(Self::entry_for(value, ttl)),
                Self::is_expired,
            )
            .await;

        Ok(entry.is_fresh())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let existed = self.cache.remove(key).await.is_some();
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                if Self::is_expired(&entry) {
                    self.cache.remove(key).await;
                    Ok(false)
                } else {
                    Ok(true)
                }
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        match self.cache.get(key).await {
            Some(entry) => {
                let now = Self::current_time_millis();

                if entry.expires_at <= now {
                    self.cache.remove(key).await;
                    Ok(None)
                } else {
                    Ok(Some(Duration::from_millis(entry.expires_at - now)))
                }
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_set_and_get() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = store.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = InMemoryStore::new();

        let result: Option<String> = store.get("missing").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let deleted = store.delete("key1").await.unwrap();
        assert!(deleted);

        let result: Option<String> = store.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_missing() {
        let store = InMemoryStore::new();

        let deleted = store.delete("missing").await.unwrap();
        assert!(!deleted);
    }

    #[tokio::test]
    async fn test_exists() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(store.exists("key1").await.unwrap());
        assert!(!store.exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_entry_expiration() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_millis(50))
            .await
            .unwrap();

        assert!(store.exists("key1").await.unwrap());

        tokio::time::sleep(Duration::from_millis(100)).await;

        let result: Option<String> = store.get("key1").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_ttl_remaining() {
        let store = InMemoryStore::new();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let ttl = store.ttl("key1").await.unwrap();
        assert!(ttl.is_some());

        let remaining = ttl.unwrap();
        assert!(remaining.as_secs() > 50 && remaining.as_secs() <= 60);
    }

    #[tokio::test]
    async fn test_ttl_missing() {
        let store = InMemoryStore::new();

        let ttl = store.ttl("missing").await.unwrap();
        assert!(ttl.is_none());
    }

    #[tokio::test]
    async fn test_set_nx() {
        let store = InMemoryStore::new();

        assert!(store
            .set_nx_raw("key1", "a", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .set_nx_raw("key1", "b", Duration::from_secs(60))
            .await
            .unwrap());

        let raw = store.get_raw("key1").await.unwrap();
        assert_eq!(raw, Some("a".to_string()));
    }

    #[tokio::test]
    async fn test_set_nx_replaces_expired_entry() {
        let store = InMemoryStore::new();

        store
            .set_nx_raw("key1", "a", Duration::from_millis(30))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(store
            .set_nx_raw("key1", "b", Duration::from_secs(60))
            .await
            .unwrap());

        let raw = store.get_raw("key1").await.unwrap();
        assert_eq!(raw, Some("b".to_string()));
    }

    #[tokio::test]
    async fn test_set_nx_is_atomic_under_contention() {
        let store = Arc::new(InMemoryStore::new());

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set_nx_raw("contended", &i.to_string(), Duration::from_secs(60))
                    .await
                    .unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_complex_types() {
        let store = InMemoryStore::new();

        #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
        struct TestData {
            name: String,
            values: Vec<i32>,
        }

        let data = TestData {
            name: "test".to_string(),
            values: vec![1, 2, 3],
        };

        store
            .set("complex", &data, Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<TestData> = store.get("complex").await.unwrap();
        assert_eq!(result, Some(data));
    }

    #[tokio::test]
    async fn test_config() {
        let config = InMemoryStoreConfig::default().with_max_capacity(100);
        assert_eq!(config.max_capacity, 100);
    }
}
