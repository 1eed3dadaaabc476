//! Periodic alert rule evaluation.
//!
//! Pulls the current metrics summary, adds provider-state signals from the selector when
//! one is attached, and hands the values to the [`AlertManager`].

use std::{sync::Arc, time::Duration};

use tokio::{sync::broadcast, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::{
    manager::AlertManager,
    types::{EvaluationReport, MetricValues},
};
use crate::{metrics::MetricsCollector, provider::ProviderSelector};

/// Custom metric: providers currently eligible for selection.
pub const AVAILABLE_PROVIDERS: &str = "available_providers";
/// Custom metric: providers in the failing state.
pub const FAILING_PROVIDERS: &str = "failing_providers";
/// Custom metric: providers in the rate-limited state.
pub const RATE_LIMITED_PROVIDERS: &str = "rate_limited_providers";

/// Evaluates alert rules in the background.
///
/// Each run is spawned on its own task so a panic inside one evaluation is logged and
/// the loop keeps going.
pub struct AlertEvaluator {
    alert_manager: Arc<AlertManager>,
    metrics_collector: Arc<MetricsCollector>,
    selector: Option<Arc<ProviderSelector>>,
    evaluation_interval: Duration,
}

impl AlertEvaluator {
    #[must_use]
    pub fn new(
        alert_manager: Arc<AlertManager>,
        metrics_collector: Arc<MetricsCollector>,
        evaluation_interval: Duration,
    ) -> Self {
        Self { alert_manager, metrics_collector, selector: None, evaluation_interval }
    }

    /// Exposes provider-state counts as custom metrics to the rules.
    #[must_use]
    pub fn with_selector(mut self, selector: Arc<ProviderSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    /// Current metric values: the metrics summary plus provider-state counts.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn current_values(&self) -> MetricValues {
        let mut values = MetricValues::from_summary(&self.metrics_collector.summary());
        if let Some(selector) = &self.selector {
            let report = selector.status_report();
            let available = report.providers.iter().filter(|p| p.eligible).count();
            values = values
                .with_custom(AVAILABLE_PROVIDERS, available as f64)
                .with_custom(FAILING_PROVIDERS, report.failing as f64)
                .with_custom(RATE_LIMITED_PROVIDERS, report.rate_limited as f64);
        }
        values
    }

    /// Runs one evaluation pass.
    pub async fn evaluate_once(&self) -> EvaluationReport {
        let values = self.current_values();
        let report = self.alert_manager.evaluate(&values).await;
        debug!(
            created = report.created.len(),
            resolved = report.resolved.len(),
            escalated = report.escalated.len(),
            "alert rules evaluated"
        );
        report
    }

    /// Starts the background evaluation task; it stops when `shutdown_rx` fires.
    #[must_use]
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let interval = self.evaluation_interval;

        tokio::spawn(async move {
            info!(interval_seconds = interval.as_secs(), "starting alert evaluator");

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("alert evaluator shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let evaluator = Arc::clone(&self);
                        let run = tokio::spawn(async move {
                            evaluator.evaluate_once().await;
                        });

                        if let Err(e) = run.await {
                            if e.is_panic() {
                                error!(error = ?e, "alert evaluation panicked, recovering");
                            } else if e.is_cancelled() {
                                warn!("alert evaluation task was cancelled");
                            }
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        alerts::{AlertMetric, AlertRule, LogNotificationSink},
        metrics::MetricsConfig,
        provider::ProviderConfig,
        types::{Comparator, FailureKind, Severity},
    };

    fn evaluator_with(rule: AlertRule) -> (Arc<AlertEvaluator>, Arc<MetricsCollector>) {
        let manager = Arc::new(AlertManager::new(Arc::new(LogNotificationSink)));
        manager.add_rule(rule).unwrap();
        let metrics =
            Arc::new(MetricsCollector::new(MetricsConfig { thresholds: Vec::new(), ..MetricsConfig::default() }));
        let evaluator = Arc::new(AlertEvaluator::new(manager, Arc::clone(&metrics), Duration::from_secs(30)));
        (evaluator, metrics)
    }

    fn error_rate_rule() -> AlertRule {
        AlertRule::new("high_error_rate", AlertMetric::ErrorRate, Comparator::GreaterThan, 20.0, Severity::Warning)
    }

    #[tokio::test]
    async fn test_no_traffic_raises_nothing() {
        let (evaluator, _) = evaluator_with(error_rate_rule());
        assert_eq!(evaluator.evaluate_once().await, EvaluationReport::default());
    }

    #[tokio::test]
    async fn test_error_rate_from_collector() {
        let (evaluator, metrics) = evaluator_with(error_rate_rule());
        let token = metrics.record_start("api-football");
        metrics.record_success(token);
        let token = metrics.record_start("api-football");
        metrics.record_failure(token, FailureKind::Timeout, "timed out");

        let report = evaluator.evaluate_once().await;
        assert_eq!(report.created.len(), 1);
        let alert = evaluator.alert_manager.get_alert(&report.created[0]).unwrap();
        assert!((alert.value - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_provider_state_signals() {
        let rule = AlertRule::new(
            "no_providers",
            AlertMetric::Custom(AVAILABLE_PROVIDERS.to_string()),
            Comparator::Equal,
            0.0,
            Severity::Critical,
        );
        let (evaluator, _) = evaluator_with(rule);
        let selector = Arc::new(ProviderSelector::default());
        selector.register(&ProviderConfig::new("only", 1)).unwrap();
        selector.disable("only").unwrap();

        let evaluator = Arc::new(
            AlertEvaluator::new(
                Arc::clone(&evaluator.alert_manager),
                Arc::clone(&evaluator.metrics_collector),
                Duration::from_secs(30),
            )
            .with_selector(selector),
        );
        let values = evaluator.current_values();
        assert_eq!(values.value(&AlertMetric::Custom(FAILING_PROVIDERS.to_string())), Some(0.0));
        assert_eq!(evaluator.evaluate_once().await.created.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_on_shutdown() {
        let (evaluator, metrics) = evaluator_with(error_rate_rule());
        let token = metrics.record_start("api-football");
        metrics.record_failure(token, FailureKind::Timeout, "timed out");

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = Arc::clone(&evaluator).start(shutdown_rx);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(evaluator.alert_manager.get_active_alerts(None).len(), 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
