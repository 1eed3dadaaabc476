//! Builder for initializing the runtime with configurable background tasks.

use crate::{
    alerts::{AlertEvaluator, AlertManager, LogNotificationSink, NotificationSink},
    cache::ResponseCache,
    config::AppConfig,
    metrics::MetricsCollector,
    provider::{HealthChecker, ProviderSelector},
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{lifecycle::MatchdayRuntime, MatchdayComponents};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    #[error("No data providers configured")]
    NoProviders,

    #[error("Runtime initialization failed: {0}")]
    Initialization(String),
}

/// Background tasks spawned by [`MatchdayRuntime::start`].
#[derive(Debug, Clone, Copy)]
pub(super) struct BackgroundTasks {
    pub cache_cleanup: bool,
    pub health_checker: bool,
    pub threshold_monitor: bool,
    pub alert_evaluator: bool,
}

#[derive(Clone)]
struct RuntimeOptions {
    tasks: BackgroundTasks,
    shutdown_channel_capacity: usize,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            tasks: BackgroundTasks {
                cache_cleanup: true,
                health_checker: true,
                threshold_monitor: true,
                alert_evaluator: true,
            },
            shutdown_channel_capacity: 16,
        }
    }
}

/// Builder for a [`MatchdayRuntime`].
///
/// Every background task is enabled by default; none runs before
/// [`MatchdayRuntime::start`].
///
/// ```no_run
/// # use matchday_core::{config::AppConfig, runtime::MatchdayRuntimeBuilder};
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut runtime = MatchdayRuntimeBuilder::new()
///     .with_config(AppConfig::load()?)
///     .disable_threshold_monitor()
///     .build()?;
/// runtime.start();
/// # Ok(())
/// # }
/// ```
pub struct MatchdayRuntimeBuilder {
    config: Option<AppConfig>,
    sink: Option<Arc<dyn NotificationSink>>,
    options: RuntimeOptions,
}

impl MatchdayRuntimeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self { config: None, sink: None, options: RuntimeOptions::default() }
    }

    #[must_use]
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets where alert notifications go (default: [`LogNotificationSink`]).
    #[must_use]
    pub fn with_notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Capacity of the shutdown broadcast channel (default: 16).
    #[must_use]
    pub fn with_shutdown_channel_capacity(mut self, capacity: usize) -> Self {
        self.options.shutdown_channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn disable_cache_cleanup(mut self) -> Self {
        self.options.tasks.cache_cleanup = false;
        self
    }

    #[must_use]
    pub fn disable_health_checker(mut self) -> Self {
        self.options.tasks.health_checker = false;
        self
    }

    #[must_use]
    pub fn disable_threshold_monitor(mut self) -> Self {
        self.options.tasks.threshold_monitor = false;
        self
    }

    #[must_use]
    pub fn disable_alert_evaluator(mut self) -> Self {
        self.options.tasks.alert_evaluator = false;
        self
    }

    /// Builds every component and registers the configured providers, thresholds and
    /// rules. No background task is spawned yet.
    ///
    /// # Errors
    ///
    /// Returns `RuntimeError` if configuration is missing or invalid, no providers are
    /// configured, or a component rejects its settings.
    pub fn build(self) -> Result<MatchdayRuntime, RuntimeError> {
        let config = self.config.ok_or_else(|| {
            RuntimeError::ConfigValidation("builder has no configuration".to_string())
        })?;
        config.validate().map_err(RuntimeError::ConfigValidation)?;

        if config.providers.providers.is_empty() {
            return Err(RuntimeError::NoProviders);
        }

        info!(
            providers_count = config.providers.providers.len(),
            alert_rules = config.alerts.rules.len(),
            thresholds = config.metrics.thresholds.len(),
            "initializing matchday runtime"
        );

        let (shutdown_tx, _) = broadcast::channel::<()>(self.options.shutdown_channel_capacity);

        let cache = Arc::new(
            ResponseCache::new(config.cache.clone())
                .map_err(|e| RuntimeError::Initialization(format!("Cache: {e}")))?,
        );
        debug!(max_size = config.cache.max_size, "response cache initialized");

        let metrics_collector = Arc::new(MetricsCollector::new(config.metrics.clone()));
        debug!("metrics collector initialized");

        let selector = Arc::new(
            ProviderSelector::new(config.selector.clone()).with_metrics(Arc::clone(&metrics_collector)),
        );
        for provider in &config.providers.providers {
            selector
                .register(provider)
                .map_err(|e| RuntimeError::Initialization(format!("Provider selector: {e}")))?;
        }
        debug!(providers = selector.len(), "provider selector initialized");

        let health_checker =
            Arc::new(HealthChecker::new(Arc::clone(&selector), config.health_check.interval()));

        let sink = self.sink.unwrap_or_else(|| Arc::new(LogNotificationSink));
        let alert_manager = Arc::new(
            AlertManager::from_config(&config.alerts, sink)
                .map_err(|e| RuntimeError::Initialization(format!("Alert manager: {e}")))?,
        );
        let alert_evaluator = Arc::new(
            AlertEvaluator::new(
                Arc::clone(&alert_manager),
                Arc::clone(&metrics_collector),
                config.alerts.evaluation_interval(),
            )
            .with_selector(Arc::clone(&selector)),
        );
        debug!("alert manager initialized");

        let components = MatchdayComponents::new(
            cache,
            selector,
            metrics_collector,
            alert_manager,
            health_checker,
            alert_evaluator,
        );

        info!("matchday runtime initialization complete");
        Ok(MatchdayRuntime::new(components, shutdown_tx, config, self.options.tasks))
    }
}

impl Default for MatchdayRuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;

    fn create_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.providers =
            vec![ProviderConfig::new("api-football", 1), ProviderConfig::new("sofascore", 2)];
        config
    }

    #[tokio::test]
    async fn test_builder_requires_config() {
        let result = MatchdayRuntimeBuilder::new().build();
        assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
    }

    #[tokio::test]
    async fn test_builder_requires_providers() {
        let result = MatchdayRuntimeBuilder::new().with_config(AppConfig::default()).build();
        assert!(matches!(result, Err(RuntimeError::NoProviders)));
    }

    #[tokio::test]
    async fn test_builder_validates_config() {
        let mut config = create_test_config();
        config.cache.max_size = 0;
        let result = MatchdayRuntimeBuilder::new().with_config(config).build();
        assert!(matches!(result, Err(RuntimeError::ConfigValidation(_))));
    }

    #[tokio::test]
    async fn test_builder_wires_components() {
        let runtime = MatchdayRuntimeBuilder::new()
            .with_config(create_test_config())
            .disable_health_checker()
            .with_shutdown_channel_capacity(4)
            .build()
            .expect("Failed to build runtime");

        let components = runtime.components();
        assert_eq!(components.selector().len(), 2);
        assert_eq!(components.alert_manager().get_rules().len(), 6);
        assert_eq!(components.metrics_collector().thresholds().len(), 9);
        assert_eq!(components.metrics_collector().summary().total_providers, 2);
        assert_eq!(runtime.task_count(), 0);

        runtime.shutdown().await;
    }
}
