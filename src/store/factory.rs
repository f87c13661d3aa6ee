//! Store factory for runtime backend selection

use std::sync::Arc;

use serde::Deserialize;

use crate::error::CacheError;
use crate::store::Store;

use super::in_memory::{InMemoryStore, InMemoryStoreConfig};
use super::redis::{RedisStore, RedisStoreConfig};

/// Supported store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// In-memory store using moka
    #[default]
    InMemory,
    /// Redis store
    Redis,
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreKind::InMemory => write!(f, "in_memory"),
            StoreKind::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for StoreKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(StoreKind::InMemory),
            "redis" => Ok(StoreKind::Redis),
            _ => Err(CacheError::configuration(format!(
                "Unknown store backend: {}. Valid backends: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the store factory
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend to create
    pub backend: StoreKind,
    /// Connection URL (required for the Redis backend)
    pub url: Option<String>,
    /// Key prefix for namespacing (Redis only)
    pub key_prefix: Option<String>,
    /// Maximum capacity (in-memory only)
    pub max_capacity: Option<u64>,
}

impl StoreConfig {
    /// Creates a configuration for the in-memory backend
    pub fn in_memory() -> Self {
        Self {
            backend: StoreKind::InMemory,
            ..Default::default()
        }
    }

    /// Creates a configuration for the Redis backend
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            backend: StoreKind::Redis,
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = Some(capacity);
        self
    }
}

/// Factory for creating store instances
#[derive(Debug, Default)]
pub struct StoreFactory;

impl StoreFactory {
    /// Creates a new store factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a store instance based on configuration
    pub async fn create(&self, config: &StoreConfig) -> Result<Arc<dyn Store>, CacheError> {
        match config.backend {
            StoreKind::InMemory => {
                let mut in_memory_config = InMemoryStoreConfig::default();

                if let Some(capacity) = config.max_capacity {
                    in_memory_config = in_memory_config.with_max_capacity(capacity);
                }

                Ok(Arc::new(InMemoryStore::with_config(in_memory_config)))
            }
            StoreKind::Redis => {
                let url = config.url.clone().ok_or_else(|| {
                    CacheError::configuration("A URL is required for the Redis backend")
                })?;

                let mut redis_config = RedisStoreConfig::new(url);

                if let Some(prefix) = &config.key_prefix {
                    redis_config = redis_config.with_key_prefix(prefix.clone());
                }

                Ok(Arc::new(RedisStore::new(redis_config).await?))
            }
        }
    }
}
