use super::selector::ProviderSelector;
use metrics::gauge;
use std::{sync::Arc, time::Duration};
use tokio::{sync::broadcast, task::JoinHandle, time::interval};
use tracing::{debug, info};

/// Periodically returns failing and rate-limited providers to service once their retry
/// window has elapsed, independent of request traffic.
pub struct HealthChecker {
    selector: Arc<ProviderSelector>,
    check_interval: Duration,
}

impl HealthChecker {
    #[must_use]
    pub fn new(selector: Arc<ProviderSelector>, check_interval: Duration) -> Self {
        Self { selector, check_interval }
    }

    /// Runs one pass and publishes the per-status gauges. Returns reactivated providers.
    pub fn check_once(&self) -> Vec<String> {
        Self::check_providers(&self.selector)
    }

    #[allow(clippy::cast_precision_loss)]
    fn check_providers(selector: &ProviderSelector) -> Vec<String> {
        let reactivated = selector.reactivate_due();
        let report = selector.status_report();

        gauge!("matchday_providers", "status" => "active").set(report.active as f64);
        gauge!("matchday_providers", "status" => "failing").set(report.failing as f64);
        gauge!("matchday_providers", "status" => "rate_limited").set(report.rate_limited as f64);
        gauge!("matchday_providers", "status" => "disabled").set(report.disabled as f64);

        debug!(
            active = report.active,
            failing = report.failing,
            rate_limited = report.rate_limited,
            disabled = report.disabled,
            reactivated = reactivated.len(),
            "provider health check completed"
        );
        reactivated
    }

    #[must_use]
    pub fn start_with_shutdown(&self, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let selector = Arc::clone(&self.selector);
        let check_interval = self.check_interval;

        tokio::spawn(async move {
            let mut interval = interval(check_interval);
            info!(interval_seconds = check_interval.as_secs(), "provider health checker started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        Self::check_providers(&selector);
                    }
                    _ = shutdown_rx.recv() => {
                        info!("provider health checker shutting down");
                        break;
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
        provider::{ProviderConfig, ProviderStatus},
        types::FailureKind,
    };

    fn failing_selector() -> Arc<ProviderSelector> {
        let selector = Arc::new(ProviderSelector::default());
        selector
            .register(&ProviderConfig::new("api-football", 1).with_retry_after(120).with_max_failures(1))
            .unwrap();
        selector.record_failure("api-football", FailureKind::Timeout);
        selector
    }

    #[tokio::test(start_paused = true)]
    async fn test_check_once_reactivates_after_window() {
        let selector = failing_selector();
        let checker = HealthChecker::new(Arc::clone(&selector), Duration::from_secs(60));

        assert!(checker.check_once().is_empty());
        tokio::time::advance(Duration::from_secs(120)).await;
        assert_eq!(checker.check_once(), vec!["api-football"]);
        assert_eq!(selector.status("api-football"), Some(ProviderStatus::Active));
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_reactivates_without_traffic() {
        let selector = failing_selector();
        let checker = HealthChecker::new(Arc::clone(&selector), Duration::from_secs(60));
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = checker.start_with_shutdown(shutdown_rx);

        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(selector.status("api-football"), Some(ProviderStatus::Active));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
