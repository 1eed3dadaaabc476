//! Configuration and error types for the response cache.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while constructing a [`ResponseCache`](super::ResponseCache).
///
/// Runtime cache operations never fail; only an unusable configuration is rejected.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A sizing or interval setting is out of range.
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

/// Sizing, expiry and compression settings for the response cache.
///
/// # Cleanup
///
/// Expired entries are removed lazily on access and eagerly by the background sweep
/// every `cleanup_interval_seconds`, independent of traffic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of live entries (default: 10 000).
    pub max_size: usize,
    /// TTL applied when the caller does not pass one (default: 3600 = 1 hour).
    pub default_ttl_seconds: u64,
    /// Interval of the background expiry sweep (default: 300 = 5 minutes).
    pub cleanup_interval_seconds: u64,
    /// Serialized size above which compression is attempted (default: 1024 bytes).
    pub compression_threshold_bytes: usize,
    /// Whether large values are compressed at all (default: true).
    pub enable_compression: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: 10_000,
            default_ttl_seconds: 3600,
            cleanup_interval_seconds: 300,
            compression_threshold_bytes: 1024,
            enable_compression: true,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_seconds)
    }

    /// Checks the settings the cache cannot operate without.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] for a zero capacity, TTL or sweep interval.
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.max_size == 0 {
            return Err(CacheError::InvalidConfig("max_size must be greater than 0".into()));
        }
        if self.default_ttl_seconds == 0 {
            return Err(CacheError::InvalidConfig(
                "default_ttl_seconds must be greater than 0".into(),
            ));
        }
        if self.cleanup_interval_seconds == 0 {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval_seconds must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}
