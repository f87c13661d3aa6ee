//! Redis store implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::error::CacheError;
use crate::store::Store;

/// Configuration for the Redis store
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub url: String,
    /// Key prefix for namespacing
    pub key_prefix: Option<String>,
}

impl RedisStoreConfig {
    /// Creates a new configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key_prefix: None,
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }
}

/// Redis store implementation
///
/// Connection pooling via ConnectionManager; the atomic create maps to a
/// single `SET NX EX` command.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    config: RedisStoreConfig,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisStore {
    /// Creates a new Redis store connection
    pub async fn new(config: RedisStoreConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| CacheError::store(format!("Failed to create Redis client: {}", e)))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::store(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self { connection, config })
    }

    /// Creates a Redis store with default configuration
    pub async fn with_url(url: impl Into<String>) -> Result<Self, CacheError> {
        Self::new(RedisStoreConfig::new(url)).await
    }

    fn prefix_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{}:{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let result: Option<String> = conn
            .get(&prefixed_key)
            .await
            .map_err(|e| CacheError::store(format!("Failed to get key '{}': {}", key, e)))?;

        Ok(result)
    }

    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let ttl_secs = ttl.as_secs().max(1);

        let _: () = conn
            .set_ex(&prefixed_key, value, ttl_secs)
            .await
            .map_err(|e| CacheError::store(format!("Failed to set key '{}': {}", key, e)))?;

        Ok(())
    }

    async fn set_nx_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let ttl_secs = ttl.as_secs().max(1);

        // Single SET NX EX for atomic set-if-not-exists with TTL
        let result: Option<String> = redis::cmd("SET")
            .arg(&prefixed_key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl_secs)
            .query_async(&mut conn)
            .await
            .map_err(|e| CacheError::store(format!("Failed to set_nx key '{}': {}", key, e)))?;

        // Redis returns "OK" if set, None if the key existed
        Ok(result.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let deleted: i32 = conn
            .del(&prefixed_key)
            .await
            .map_err(|e| CacheError::store(format!("Failed to delete key '{}': {}", key, e)))?;

        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&prefixed_key).await.map_err(|e| {
            CacheError::store(format!("Failed to check existence of key '{}': {}", key, e))
        })?;

        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let prefixed_key = self.prefix_key(key);
        let mut conn = self.connection.clone();

        let ttl_secs: i64 = conn
            .ttl(&prefixed_key)
            .await
            .map_err(|e| CacheError::store(format!("Failed to get TTL for key '{}': {}", key, e)))?;

        // Redis returns -2 if the key doesn't exist, -1 if no TTL
        if ttl_secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(ttl_secs as u64)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreExt;

    // Note: These tests require a running Redis instance

    fn get_test_config() -> RedisStoreConfig {
        RedisStoreConfig::new("redis://127.0.0.1:6379").with_key_prefix("test")
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_and_get() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

        store
            .set("key1", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let result: Option<String> = store.get("key1").await.unwrap();
        assert_eq!(result, Some("value1".to_string()));

        // Cleanup
        store.delete("key1").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_delete() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

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
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_set_nx() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

        // First set should succeed
        let result = store
            .set_nx_raw("nx_key", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(result);

        // Second set should fail
        let result = store
            .set_nx_raw("nx_key", "value2", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!result);

        // Cleanup
        store.delete("nx_key").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_ttl() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

        store
            .set("ttl_key", &"value1", Duration::from_secs(60))
            .await
            .unwrap();

        let ttl = store.ttl("ttl_key").await.unwrap();
        assert!(ttl.is_some());
        assert!(ttl.unwrap().as_secs() > 50);

        // Cleanup
        store.delete("ttl_key").await.unwrap();
    }

    #[tokio::test]
    #[ignore = "Requires running Redis instance"]
    async fn test_redis_ttl_missing_key() {
        let store = RedisStore::new(get_test_config()).await.unwrap();

        let ttl = store.ttl("no_such_key").await.unwrap();
        assert!(ttl.is_none());
    }

    #[test]
    fn test_key_prefix() {
        let config = RedisStoreConfig::new("redis://localhost").with_key_prefix("myapp");
        assert_eq!(config.key_prefix, Some("myapp".to_string()));
    }
}
