use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Registration settings for one upstream data provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name.
    pub name: String,
    /// Static priority; lower is preferred.
    pub priority: u32,
    /// Seconds a failing provider is skipped before it may be tried again (default: 300).
    #[serde(default = "default_retry_after")]
    pub retry_after_seconds: u64,
    /// Seconds a rate-limited provider is skipped. Falls back to `retry_after_seconds`.
    #[serde(default)]
    pub rate_limit_retry_after_seconds: Option<u64>,
    /// Consecutive failures before the provider is marked failing (default: 3).
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
}

fn default_retry_after() -> u64 {
    300
}

fn default_max_failures() -> u32 {
    3
}

impl ProviderConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, priority: u32) -> Self {
        Self {
            name: name.into(),
            priority,
            retry_after_seconds: default_retry_after(),
            rate_limit_retry_after_seconds: None,
            max_failures: default_max_failures(),
        }
    }

    #[must_use]
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_rate_limit_retry_after(mut self, seconds: u64) -> Self {
        self.rate_limit_retry_after_seconds = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures;
        self
    }

    #[must_use]
    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.retry_after_seconds)
    }

    #[must_use]
    pub fn rate_limit_retry_after(&self) -> Duration {
        Duration::from_secs(self.rate_limit_retry_after_seconds.unwrap_or(self.retry_after_seconds))
    }
}

/// List of providers registered at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub providers: Vec<ProviderConfig>,
}

/// Backoff between fallback attempts.
///
/// The sleep before attempt `i + 1` is `min(backoff_base_ms * 2^i, max_backoff_ms)`,
/// where `i` is the number of attempts that already failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub backoff_base_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self { backoff_base_ms: 1000, max_backoff_ms: 30_000 }
    }
}

impl SelectorConfig {
    /// Delay to wait after `failed_attempts` failures in one call.
    #[must_use]
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let factor = 2u64.checked_pow(failed_attempts).unwrap_or(u64::MAX);
        let millis = self.backoff_base_ms.saturating_mul(factor).min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Interval of the provider reactivation loop (default: 60 seconds).
    pub interval_seconds: u64,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self { interval_seconds: 60 }
    }
}

impl HealthCheckConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}
