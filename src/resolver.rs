//! The resolve protocol: read, lock, compute, publish
//!
//! `resolve` returns the cached value when one exists. On a miss, exactly
//! one caller across all processes sharing the store computes the value
//! while every other caller for the same key waits on the configured retry
//! schedule and then reads the published result. Coordination happens
//! entirely through the store; the resolver itself holds no per-call state
//! and can be shared freely across tasks.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::config::ResolverConfig;
use crate::error::{CacheError, ComputeError};
use crate::lock::LockManager;
use crate::retry::RetryPolicy;
use crate::store::{Store, StoreExt, StoreFactory};

/// Per-call overrides for a single `resolve` invocation
///
/// An options value is immutable for the duration of the call. Defaults
/// reproduce the resolver's configured behavior.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Skips the lock-free fast-path read and always recomputes
    pub force: bool,
    /// Overrides the lock key derived from the cache key
    pub lock_key: Option<String>,
    /// Overrides the configured retry policy for this call
    pub retry: Option<RetryPolicy>,
}

impl ResolveOptions {
    /// Creates options matching the resolver's configured behavior
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypasses the fast-path read and recomputes even if a value exists
    pub fn with_force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Uses `name` as the lock key instead of the derived one
    pub fn with_lock_key(mut self, name: impl Into<String>) -> Self {
        self.lock_key = Some(name.into());
        self
    }

    /// Uses `policy` for this call's wait loop
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Stampede-safe cache client over a shared store
#[derive(Debug, Clone)]
pub struct CacheResolver {
    store: Arc<dyn Store>,
    locks: LockManager,
    retry: RetryPolicy,
}

impl CacheResolver {
    /// Creates a resolver over an already-connected store
    pub fn new(store: Arc<dyn Store>, config: &ResolverConfig) -> Result<Self, CacheError> {
        Ok(Self {
            locks: LockManager::new(store.clone(), &config.lock_prefix, config.lock_expiry()),
            retry: config.retry_policy()?,
            store,
        })
    }

    /// Creates a resolver together with the store its configuration selects
    pub async fn from_config(config: &ResolverConfig) -> Result<Self, CacheError> {
        let store = StoreFactory::new().create(&config.store).await?;
        Self::new(store, config)
    }

    /// Resolves `key`, computing and caching the value on a miss
    ///
    /// The computed value is serialized to JSON for storage; pick the decode
    /// target freely on later reads (`serde_json::Value` for map-shaped
    /// access, a concrete struct for records).
    pub async fn resolve<V, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, ComputeError>> + Send,
    {
        self.resolve_with(key, ttl, compute, &ResolveOptions::default())
            .await
    }

    /// Resolves `key` with explicit per-call options
    pub async fn resolve_with<V, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        options: &ResolveOptions,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, ComputeError>> + Send,
    {
        self.resolve_on_fill(key, ttl, compute, |_: &V| {}, options)
            .await
    }

    /// Resolves `key`, invoking `on_fill` if this caller computed the value
    ///
    /// The hook runs at most once, only on the computing path, after the
    /// value is durably stored and before the lock is released. It receives
    /// the canonical stored representation and has no failure channel: the
    /// completed cache write cannot be unwound from it.
    pub async fn resolve_on_fill<V, F, Fut, H>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        on_fill: H,
        options: &ResolveOptions,
    ) -> Result<V, CacheError>
    where
        V: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<V, ComputeError>> + Send,
        H: FnOnce(&V) + Send,
    {
        let compute_raw = move || async move {
            let value = compute().await.map_err(CacheError::compute)?;
            serde_json::to_string(&value).map_err(|e| {
                CacheError::serialization(format!("Failed to serialize computed value: {}", e))
            })
        };
        let on_fill_raw = move |raw: &str| {
            if let Ok(value) = serde_json::from_str::<V>(raw) {
                on_fill(&value);
            }
        };

        let raw = self
            .resolve_inner(key, ttl, compute_raw, on_fill_raw, options)
            .await?;

        serde_json::from_str(&raw).map_err(|e| {
            CacheError::serialization(format!("Failed to deserialize cached value: {}", e))
        })
    }

    /// Resolves `key` without serialization: the computed string is stored
    /// and returned unchanged
    ///
    /// For values the store holds natively; the caller owns the format.
    pub async fn resolve_raw<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, ComputeError>> + Send,
    {
        self.resolve_raw_with(key, ttl, compute, &ResolveOptions::default())
            .await
    }

    /// Raw-mode resolve with explicit per-call options
    pub async fn resolve_raw_with<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        options: &ResolveOptions,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, ComputeError>> + Send,
    {
        let compute_raw = move || async move { compute().await.map_err(CacheError::compute) };
        self.resolve_inner(key, ttl, compute_raw, |_: &str| {}, options)
            .await
    }

    /// Unconditionally writes a typed value, bypassing the resolve protocol
    pub async fn insert<V>(&self, key: &str, ttl: Duration, value: &V) -> Result<(), CacheError>
    where
        V: Serialize + Send + Sync,
    {
        self.store.set(key, value, ttl).await
    }

    /// Unconditionally writes a raw value, bypassing the resolve protocol
    pub async fn insert_raw(&self, key: &str, ttl: Duration, value: &str) -> Result<(), CacheError> {
        self.store.set_raw(key, value, ttl).await
    }

    /// Removes a cached entry, returning whether it existed
    pub async fn remove(&self, key: &str) -> Result<bool, CacheError> {
        self.store.delete(key).await
    }

    /// Checks whether a live entry exists at `key`
    pub async fn contains(&self, key: &str) -> Result<bool, CacheError> {
        self.store.exists(key).await
    }

    async fn resolve_inner<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        on_fill: impl FnOnce(&str) + Send,
        options: &ResolveOptions,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, CacheError>> + Send,
    {
        // Fast path: a live entry is returned without touching the lock.
        if !options.force {
            if let Some(raw) = self.store.get_raw(key).await? {
                debug!(key = %key, "cache hit");
                return Ok(raw);
            }
        }

        let lock_key = match &options.lock_key {
            Some(name) => name.clone(),
            None => self.locks.key_for(key),
        };

        if self.locks.acquire(&lock_key).await? {
            debug!(key = %key, lock_key = %lock_key, "lock acquired, computing");

            let result = self.fill(key, ttl, compute, on_fill).await;

            // Released on every outcome; a failed delete is left to lapse
            // on the lock's own expiry.
            if let Err(e) = self.locks.release(&lock_key).await {
                warn!(key = %key, lock_key = %lock_key, error = %e, "failed to release lock");
            }

            return result;
        }

        let retry = options.retry.as_ref().unwrap_or(&self.retry);
        debug!(key = %key, lock_key = %lock_key, "lock held elsewhere, waiting");

        self.wait_for_fill(key, &lock_key, retry).await
    }

    /// Critical section of the computing caller: compute, publish, re-read
    /// the canonical representation, notify
    async fn fill<F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
        on_fill: impl FnOnce(&str) + Send,
    ) -> Result<String, CacheError>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<String, CacheError>> + Send,
    {
        let encoded = compute().await?;
        self.store.set_raw(key, &encoded, ttl).await?;

        let stored = match self.store.get_raw(key).await? {
            Some(raw) => raw,
            None => encoded,
        };

        on_fill(&stored);
        debug!(key = %key, "value computed and stored");

        Ok(stored)
    }

    /// Wait loop of a caller that lost the lock race: poll the store on the
    /// policy's schedule while the computing caller's lock is still alive
    async fn wait_for_fill(
        &self,
        key: &str,
        lock_key: &str,
        retry: &RetryPolicy,
    ) -> Result<String, CacheError> {
        let mut attempt = 0;
        while let Some(delay) = retry.delay(attempt) {
            tokio::time::sleep(delay).await;

            if let Some(raw) = self.store.get_raw(key).await? {
                debug!(key = %key, attempt, "value appeared while waiting");
                return Ok(raw);
            }

            match self.locks.remaining(lock_key).await? {
                Some(left) if !left.is_zero() => {}
                _ => {
                    debug!(key = %key, attempt, "lock lapsed before a value appeared");
                    break;
                }
            }

            attempt += 1;
        }

        // The computer may have published between our last read and the
        // loop ending.
        match self.store.get_raw(key).await? {
            Some(raw) => Ok(raw),
            None => Err(CacheError::resolution(key)),
        }
    }
}
