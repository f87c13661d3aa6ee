//! Stampede-safe cache resolution
//!
//! When many callers hit a missing or expired cache entry at once, naive
//! read-through caching recomputes the value in every one of them. This
//! crate coordinates those callers through a shared store so that exactly
//! one computes while the rest wait and read the published result:
//! - A distributed lock (the store's atomic set-if-absent with expiry)
//!   elects the single computing caller per key.
//! - Waiting callers poll on a shaped schedule: fixed sleeps (aggressive),
//!   the budget spread evenly (diffused), or exponential back-off
//!   normalized to the budget (progressive).
//! - A waiter gives up once its attempt budget is spent or the computer's
//!   lock lapses, and surfaces that as an explicit error rather than a
//!   missing value.
//!
//! Store backends: Redis for distributed deployments, an in-process moka
//! store for tests and single-process use.

pub mod config;
pub mod error;
pub mod lock;
pub mod resolver;
pub mod retry;
pub mod store;

pub use config::ResolverConfig;
pub use error::{CacheError, ComputeError};
pub use lock::LockManager;
pub use resolver::{CacheResolver, ResolveOptions};
pub use retry::{RetryMode, RetryPolicy};
pub use store::{
    InMemoryStore, InMemoryStoreConfig, RedisStore, RedisStoreConfig, Store, StoreConfig,
    StoreExt, StoreFactory, StoreKind,
};
