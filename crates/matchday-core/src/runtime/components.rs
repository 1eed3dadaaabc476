//! Core component container for the runtime.

use crate::{
    alerts::{AlertEvaluator, AlertManager},
    cache::ResponseCache,
    gateway::DataGateway,
    metrics::MetricsCollector,
    provider::{HealthChecker, ProviderSelector},
    snapshot::SystemSnapshot,
};
use std::sync::Arc;

/// All initialized components, each behind an `Arc` and safe to share across tasks.
#[derive(Clone)]
pub struct MatchdayComponents {
    cache: Arc<ResponseCache>,
    selector: Arc<ProviderSelector>,
    metrics_collector: Arc<MetricsCollector>,
    alert_manager: Arc<AlertManager>,
    health_checker: Arc<HealthChecker>,
    alert_evaluator: Arc<AlertEvaluator>,
}

impl MatchdayComponents {
    /// Called by `MatchdayRuntimeBuilder` during initialization.
    #[must_use]
    pub fn new(
        cache: Arc<ResponseCache>,
        selector: Arc<ProviderSelector>,
        metrics_collector: Arc<MetricsCollector>,
        alert_manager: Arc<AlertManager>,
        health_checker: Arc<HealthChecker>,
        alert_evaluator: Arc<AlertEvaluator>,
    ) -> Self {
        Self { cache, selector, metrics_collector, alert_manager, health_checker, alert_evaluator }
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    #[must_use]
    pub fn selector(&self) -> &Arc<ProviderSelector> {
        &self.selector
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        &self.metrics_collector
    }

    #[must_use]
    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        &self.alert_manager
    }

    #[must_use]
    pub fn health_checker(&self) -> &Arc<HealthChecker> {
        &self.health_checker
    }

    #[must_use]
    pub fn alert_evaluator(&self) -> &Arc<AlertEvaluator> {
        &self.alert_evaluator
    }

    /// A cache-first gateway over the shared cache and selector.
    #[must_use]
    pub fn gateway(&self) -> DataGateway {
        DataGateway::new(Arc::clone(&self.cache), Arc::clone(&self.selector))
    }

    #[must_use]
    pub fn snapshot(&self) -> SystemSnapshot {
        SystemSnapshot::capture(&self.cache, &self.selector, &self.metrics_collector, &self.alert_manager)
    }
}
