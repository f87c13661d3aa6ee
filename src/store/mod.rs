//! The shared key/value store behind the resolver
//!
//! All coordination between concurrent callers goes through this store; the
//! crate holds no cross-call state of its own. Raw string values keep the
//! trait dyn-compatible; typed access is layered on top by [`StoreExt`].

mod factory;
mod in_memory;
mod redis;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheError;

pub use factory::{StoreConfig, StoreFactory, StoreKind};
pub use in_memory::{InMemoryStore, InMemoryStoreConfig};
pub use redis::{RedisStore, RedisStoreConfig};

#[cfg(test)]
pub use mock::MockStore;

/// Key/value store with per-entry expiry and an atomic create
#[async_trait]
pub trait Store: Send + Sync + Debug {
    /// Reads the raw value stored at `key`
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Unconditionally writes `value` at `key` with an expiry
    async fn set_raw(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Creates `key` with an expiry only if it is absent, returning whether
    /// this call created it
    ///
    /// Implementations must perform this as a single atomic store operation,
    /// never as separate exists-then-set calls: two callers racing on an
    /// absent key must not both observe `true`.
    async fn set_nx_raw(&self, key: &str, value: &str, ttl: Duration)
        -> Result<bool, CacheError>;

    /// Deletes `key`, returning whether it existed
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Checks whether `key` currently exists
    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.get_raw(key).await?.is_some())
    }

    /// Remaining lifetime of `key`, or `None` if the key is absent or
    /// carries no expiry
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

/// Extension trait providing typed get/set over the raw operations
pub trait StoreExt: Store {
    /// Gets a typed value from the store
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, CacheError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(|e| {
                        CacheError::serialization(format!(
                            "Failed to deserialize stored value: {}",
                            e
                        ))
                    })?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Sets a typed value in the store with an expiry
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Duration,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(|e| {
                CacheError::serialization(format!("Failed to serialize value: {}", e))
            })?;
            self.set_raw(key, &data, ttl).await
        }
    }
}

// Blanket implementation for all types implementing Store
impl<T: Store + ?Sized> StoreExt for T {}
