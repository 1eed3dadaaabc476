//! Typed `matchday` settings, merged from defaults, a TOML file and the environment.
//!
//! # Sources
//!
//! Lowest precedence first:
//!
//! 1. **Compiled defaults**: `Default` implementations of every section
//! 2. **Config file**: TOML file named by the `MATCHDAY_CONFIG` env var
//!    (default `config/config.toml`, optional)
//! 3. **Environment variables**: `MATCHDAY__SECTION__FIELD` overrides single fields
//!
//! # Sections
//!
//! - [`CacheConfig`]: capacity, default TTL, sweep interval, compression
//! - [`ProvidersConfig`]: providers registered at startup
//! - [`SelectorConfig`]: backoff between fallback attempts
//! - [`HealthCheckConfig`]: provider reactivation interval
//! - [`MetricsConfig`]: latency window, threshold monitor and thresholds
//! - [`AlertsConfig`]: rule evaluation interval, auto-resolve and rules
//! - [`LoggingConfig`]: log level and format
//! - [`SnapshotConfig`]: optional JSON state dump on shutdown
//!
//! # Example
//!
//! ```toml
//! [cache]
//! max_size = 5000
//! default_ttl_seconds = 600
//!
//! [[providers.providers]]
//! name = "api-football"
//! priority = 1
//! max_failures = 3
//!
//! [[providers.providers]]
//! name = "sofascore"
//! priority = 2
//! rate_limit_retry_after_seconds = 60
//! ```

use crate::{
    alerts::AlertsConfig,
    cache::CacheConfig,
    metrics::MetricsConfig,
    provider::{HealthCheckConfig, ProvidersConfig, SelectorConfig},
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path};

pub use config::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// `"pretty"` or `"json"`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

/// Optional JSON dump of the system state, for offline inspection only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Written on shutdown when set.
    pub path: Option<String>,
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Deployment environment label (default: `"development"`).
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub providers: ProvidersConfig,

    #[serde(default)]
    pub selector: SelectorConfig,

    #[serde(default)]
    pub health_check: HealthCheckConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,

    #[serde(default)]
    pub alerts: AlertsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            cache: CacheConfig::default(),
            providers: ProvidersConfig::default(),
            selector: SelectorConfig::default(),
            health_check: HealthCheckConfig::default(),
            metrics: MetricsConfig::default(),
            alerts: AlertsConfig::default(),
            logging: LoggingConfig::default(),
            snapshot: SnapshotConfig::default(),
        }
    }
}

impl AppConfig {
    /// Reads `config_path` if it exists and layers `MATCHDAY__*` variables on top.
    ///
    /// Environment variables with the `MATCHDAY__` prefix override single values, with
    /// `__` separating nested fields (e.g. `MATCHDAY__CACHE__MAX_SIZE=500`).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be parsed or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("environment", "development")?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("MATCHDAY").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }

    /// Loads configuration from `config/config.toml`, or the path in `MATCHDAY_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("MATCHDAY_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Checks the constraints serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string for the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        self.cache.validate().map_err(|e| e.to_string())?;

        let mut names = HashSet::new();
        for provider in &self.providers.providers {
            if provider.name.trim().is_empty() {
                return Err("Provider name must not be empty".to_string());
            }
            if !names.insert(provider.name.as_str()) {
                return Err(format!("Duplicate provider name: {}", provider.name));
            }
            if provider.max_failures == 0 {
                return Err(format!(
                    "max_failures must be greater than 0 for provider: {}",
                    provider.name
                ));
            }
        }

        if self.selector.max_backoff_ms < self.selector.backoff_base_ms {
            return Err("max_backoff_ms must not be lower than backoff_base_ms".to_string());
        }

        if self.health_check.interval_seconds == 0 {
            return Err("health_check.interval_seconds must be greater than 0".to_string());
        }

        if self.metrics.window_size == 0 {
            return Err("Metrics window size must be greater than 0".to_string());
        }
        if self.metrics.evaluation_interval_seconds == 0 {
            return Err("Metrics evaluation interval must be greater than 0".to_string());
        }
        if self.metrics.max_events == 0 {
            return Err("Metrics max_events must be greater than 0".to_string());
        }

        if self.alerts.evaluation_interval_seconds == 0 {
            return Err("Alert evaluation interval must be greater than 0".to_string());
        }
        let mut rule_names = HashSet::new();
        for rule in &self.alerts.rules {
            if !rule_names.insert(rule.name.as_str()) {
                return Err(format!("Duplicate alert rule name: {}", rule.name));
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("logging.format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
