use thiserror::Error;

/// Boxed error produced by a caller-supplied computation
pub type ComputeError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the resolve protocol and its store adapters
#[derive(Debug, Error)]
pub enum CacheError {
    /// The supplied computation failed. The lock was already released when
    /// this error was returned, and nothing was stored.
    #[error("Computation failed: {source}")]
    Compute {
        #[source]
        source: ComputeError,
    },

    /// The retry budget was exhausted without a value ever appearing
    #[error("No value obtained for key '{key}' within the retry budget")]
    Resolution { key: String },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl CacheError {
    pub fn compute(source: impl Into<ComputeError>) -> Self {
        Self::Compute {
            source: source.into(),
        }
    }

    pub fn resolution(key: impl Into<String>) -> Self {
        Self::Resolution { key: key.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}
