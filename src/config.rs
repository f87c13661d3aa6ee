//! Client configuration

use std::time::Duration;

use serde::Deserialize;

use crate::error::CacheError;
use crate::retry::{RetryMode, RetryPolicy};
use crate::store::StoreConfig;

/// Resolver configuration, loaded once and shared by every resolver built
/// from it
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Namespace prefixed to derived lock keys
    pub lock_prefix: String,
    /// Seconds a lock is valid before the holder is presumed abandoned
    pub lock_expire: u64,
    /// Caller-facing response budget in seconds (e.g. an upstream deadline)
    pub max_response_time: u64,
    /// Milliseconds subtracted from the converted budget as safety margin
    pub tolerance: u64,
    /// Delay-shaping algorithm for waiting callers
    pub retry_mode: RetryMode,
    /// Fixed per-attempt sleep in milliseconds (aggressive mode)
    pub retry_sleep: u64,
    /// Attempt budget for the wait loop
    pub retry_times: u32,
    /// Store backend selection
    pub store: StoreConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            lock_prefix: "lock".to_string(),
            lock_expire: 60,
            max_response_time: 10,
            tolerance: 100,
            retry_mode: RetryMode::default(),
            retry_sleep: 100,
            retry_times: 5,
            store: StoreConfig::default(),
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from layered files and the environment
    ///
    /// Reads `config/default` and `config/local` if present, then applies
    /// `CACHE_*` environment overrides (`CACHE_LOCK_EXPIRE=120`,
    /// `CACHE_STORE__URL=redis://...`).
    pub fn load() -> Result<Self, CacheError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("CACHE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| CacheError::configuration(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CacheError::configuration(e.to_string()))
    }

    /// Millisecond wait budget: the converted response ceiling minus the
    /// tolerance margin, floored at zero
    pub fn timeout_budget(&self) -> Duration {
        Duration::from_millis((self.max_response_time * 1000).saturating_sub(self.tolerance))
    }

    /// Expiry applied to lock records
    pub fn lock_expiry(&self) -> Duration {
        Duration::from_secs(self.lock_expire)
    }

    /// Builds the retry policy these settings describe
    pub fn retry_policy(&self) -> Result<RetryPolicy, CacheError> {
        RetryPolicy::from_mode(
            self.retry_mode,
            self.retry_times,
            Duration::from_millis(self.retry_sleep),
            self.timeout_budget(),
        )
    }
}
