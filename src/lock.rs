//! Distributed lock over the store's atomic create
//!
//! A lock is an ordinary store key whose presence signals that a computation
//! for the corresponding cache key is in progress. The store's atomic
//! set-if-absent is the only synchronization primitive: at most one caller
//! observes a successful create per validity window. The expiry on the lock
//! record is the sole recovery mechanism when the holder dies.

use std::sync::Arc;
use std::time::Duration;

use crate::error::CacheError;
use crate::store::Store;

/// Marker stored under the lock key; its presence is what matters
const LOCK_MARKER: &str = "1";

/// Acquire/release semantics for named locks in the store
#[derive(Debug, Clone)]
pub struct LockManager {
    store: Arc<dyn Store>,
    prefix: String,
    expire: Duration,
}

impl LockManager {
    /// Creates a lock manager over the given store
    pub fn new(store: Arc<dyn Store>, prefix: impl Into<String>, expire: Duration) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            expire,
        }
    }

    /// Derives the lock key guarding `key`
    pub fn key_for(&self, key: &str) -> String {
        format!("{}_{}", self.prefix, key)
    }

    /// Attempts to take the lock, returning whether this caller now holds it
    ///
    /// A store failure propagates rather than reading as "not acquired".
    pub async fn acquire(&self, lock_key: &str) -> Result<bool, CacheError> {
        self.store
            .set_nx_raw(lock_key, LOCK_MARKER, self.expire)
            .await
    }

    /// Drops the lock unconditionally
    ///
    /// Idempotent: releasing a lock that already expired or was never held
    /// is a no-op.
    pub async fn release(&self, lock_key: &str) -> Result<(), CacheError> {
        self.store.delete(lock_key).await?;
        Ok(())
    }

    /// Remaining lifetime of the lock record, or `None` once it is gone
    pub async fn remaining(&self, lock_key: &str) -> Result<Option<Duration>, CacheError> {
        self.store.ttl(lock_key).await
    }

    /// The expiry applied to newly acquired locks
    pub fn expire(&self) -> Duration {
        self.expire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn manager() -> LockManager {
        LockManager::new(
            Arc::new(InMemoryStore::new()),
            "lock",
            Duration::from_secs(60),
        )
    }

    #[test]
    fn test_key_derivation() {
        let locks = manager();
        assert_eq!(locks.key_for("report:42"), "lock_report:42");
    }

    #[tokio::test]
    async fn test_acquire_is_exclusive() {
        let locks = manager();
        let key = locks.key_for("report");

        assert!(locks.acquire(&key).await.unwrap());
        assert!(!locks.acquire(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_frees_the_lock() {
        let locks = manager();
        let key = locks.key_for("report");

        assert!(locks.acquire(&key).await.unwrap());
        locks.release(&key).await.unwrap();
        assert!(locks.acquire(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let locks = manager();
        let key = locks.key_for("report");

        locks.release(&key).await.unwrap();
        locks.release(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_remaining_lifetime() {
        let locks = manager();
        let key = locks.key_for("report");

        assert!(locks.remaining(&key).await.unwrap().is_none());

        locks.acquire(&key).await.unwrap();
        let remaining = locks.remaining(&key).await.unwrap();
        assert!(remaining.is_some());
        assert!(remaining.unwrap() <= Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_reacquired() {
        let locks = LockManager::new(
            Arc::new(InMemoryStore::new()),
            "lock",
            Duration::from_millis(30),
        );
        let key = locks.key_for("report");

        assert!(locks.acquire(&key).await.unwrap());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(locks.acquire(&key).await.unwrap());
    }
}
