//! # Metrics Collector
//!
//! Records the duration and outcome of every provider attempt and derives rolling
//! statistics from them.
//!
//! ## Recording
//!
//! Each attempt is bracketed by [`MetricsCollector::record_start`], which returns a
//! [`RequestToken`], and one of [`MetricsCollector::record_success`] or
//! [`MetricsCollector::record_failure`]. Counters are monotonic; response times go into a
//! bounded [`LatencyWindow`] per provider. A token dropped without either call (the
//! attempt's future was cancelled) is counted as a failure of kind `other`.
//!
//! Every recording is mirrored to the `metrics` facade (`matchday_provider_*`), so any
//! exporter installed by the host process picks them up.
//!
//! ## Thresholds
//!
//! The threshold monitor evaluates each configured [`Threshold`] against every provider
//! with traffic. An event fires only if no equivalent event (same provider, metric,
//! operator and value) fired within the threshold's cooldown. Events are kept in a
//! bounded log pruned after the retention window and passed to registered callbacks.

pub mod thresholds;
pub mod types;
pub mod window;

pub use types::{
    EventCallback, EventFilter, MetricKind, MetricsConfig, MetricsSummary, ProviderRanking,
    ProviderStats, RequestToken, Threshold, ThresholdEvent,
};
pub use window::LatencyWindow;

use crate::types::{FailureKind, Severity};
use chrono::Utc;
use dashmap::DashMap;
use metrics::{counter, histogram};
use parking_lot::{Mutex, RwLock};
use std::{
    collections::BTreeMap,
    fmt::Write as _,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use thresholds::EventLog;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, error, info, warn};

pub(crate) type ProviderTable = DashMap<String, ProviderMetrics>;

const ABANDONED_MESSAGE: &str = "request abandoned before completion";

/// Look-back for [`MetricsSummary::recent_events`].
const RECENT_EVENTS_WINDOW: Duration = Duration::from_secs(3600);

/// Mutable per-provider state.
#[derive(Debug)]
pub(crate) struct ProviderMetrics {
    window: LatencyWindow,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    in_flight: u64,
    error_counts: BTreeMap<FailureKind, u64>,
    last_error: Option<String>,
    first_request_at: Option<Instant>,
    last_request_at: Option<Instant>,
}

impl ProviderMetrics {
    fn new(window_size: usize) -> Self {
        Self {
            window: LatencyWindow::new(window_size),
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            in_flight: 0,
            error_counts: BTreeMap::new(),
            last_error: None,
            first_request_at: None,
            last_request_at: None,
        }
    }

    fn record_abandoned(&mut self) {
        self.failed_requests += 1;
        self.in_flight = self.in_flight.saturating_sub(1);
        *self.error_counts.entry(FailureKind::Other).or_insert(0) += 1;
        self.last_error = Some(ABANDONED_MESSAGE.to_string());
    }

    #[allow(clippy::cast_precision_loss)]
    fn stats(&self, provider: &str) -> ProviderStats {
        let (success_rate, failure_rate) = if self.total_requests == 0 {
            (0.0, 0.0)
        } else {
            let total = self.total_requests as f64;
            (
                self.successful_requests as f64 / total * 100.0,
                self.failed_requests as f64 / total * 100.0,
            )
        };

        ProviderStats {
            provider: provider.to_string(),
            total_requests: self.total_requests,
            successful_requests: self.successful_requests,
            failed_requests: self.failed_requests,
            in_flight: self.in_flight,
            success_rate,
            failure_rate,
            average_response_time: self.window.average(),
            median_response_time: self.window.median(),
            p95_response_time: self.window.p95(),
            requests_per_minute: self.requests_per_minute(),
            sample_count: self.window.len(),
            error_counts: self.error_counts.clone(),
            last_error: self.last_error.clone(),
        }
    }

    /// Total requests over the minutes between the first and the last request.
    #[allow(clippy::cast_precision_loss)]
    fn requests_per_minute(&self) -> f64 {
        let (Some(first), Some(last)) = (self.first_request_at, self.last_request_at) else {
            return 0.0;
        };
        let minutes = last.saturating_duration_since(first).as_secs_f64() / 60.0;
        if minutes == 0.0 {
            return 0.0;
        }
        self.total_requests as f64 / minutes
    }
}

/// Collects per-provider outcomes and evaluates thresholds over them.
pub struct MetricsCollector {
    providers: Arc<ProviderTable>,
    thresholds: RwLock<Vec<Threshold>>,
    events: Mutex<EventLog>,
    callbacks: RwLock<Vec<EventCallback>>,
    config: MetricsConfig,
}

impl MetricsCollector {
    /// Creates a collector seeded with the configured thresholds.
    #[must_use]
    pub fn new(config: MetricsConfig) -> Self {
        Self {
            providers: Arc::new(DashMap::new()),
            thresholds: RwLock::new(config.thresholds.clone()),
            events: Mutex::new(EventLog::new(config.max_events, config.event_retention())),
            callbacks: RwLock::new(Vec::new()),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    // ========== Registration ==========

    /// Starts tracking `provider`. Registering twice is a no-op.
    pub fn register_provider(&self, provider: &str) {
        let window_size = self.config.window_size;
        self.providers.entry(provider.to_string()).or_insert_with(|| {
            info!(provider = %provider, "provider registered for metrics");
            ProviderMetrics::new(window_size)
        });
    }

    /// Stops tracking `provider`. Returns `true` if it was tracked.
    pub fn unregister_provider(&self, provider: &str) -> bool {
        let removed = self.providers.remove(provider).is_some();
        if removed {
            info!(provider = %provider, "provider removed from metrics");
        }
        removed
    }

    // ========== Recording ==========

    /// Records the start of an attempt against `provider`, registering it if needed.
    pub fn record_start(&self, provider: &str) -> RequestToken {
        let now = Instant::now();
        let window_size = self.config.window_size;
        let mut metrics = self
            .providers
            .entry(provider.to_string())
            .or_insert_with(|| ProviderMetrics::new(window_size));

        metrics.total_requests += 1;
        metrics.in_flight += 1;
        metrics.first_request_at.get_or_insert(now);
        metrics.last_request_at = Some(now);

        RequestToken {
            provider: Arc::from(provider),
            started_at: now,
            table: Some(Arc::clone(&self.providers)),
        }
    }

    /// Records a successful attempt and returns its measured duration.
    pub fn record_success(&self, mut token: RequestToken) -> Duration {
        token.table = None;
        let elapsed = token.started_at.elapsed();
        if let Some(mut metrics) = self.providers.get_mut(token.provider.as_ref()) {
            metrics.successful_requests += 1;
            metrics.in_flight = metrics.in_flight.saturating_sub(1);
            metrics.window.record(elapsed.as_secs_f64());
        }

        counter!("matchday_provider_requests_total", "provider" => token.provider.to_string(), "outcome" => "success")
            .increment(1);
        histogram!("matchday_provider_response_seconds", "provider" => token.provider.to_string())
            .record(elapsed.as_secs_f64());
        debug!(provider = %token.provider, elapsed_ms = elapsed.as_millis(), "request succeeded");
        elapsed
    }

    /// Records a failed attempt and returns its measured duration.
    ///
    /// The elapsed time also enters the response-time window.
    pub fn record_failure(&self, mut token: RequestToken, kind: FailureKind, message: &str) -> Duration {
        token.table = None;
        let elapsed = token.started_at.elapsed();
        if let Some(mut metrics) = self.providers.get_mut(token.provider.as_ref()) {
            metrics.failed_requests += 1;
            metrics.in_flight = metrics.in_flight.saturating_sub(1);
            *metrics.error_counts.entry(kind).or_insert(0) += 1;
            metrics.last_error = Some(message.to_string());
            metrics.window.record(elapsed.as_secs_f64());
        }

        counter!(
            "matchday_provider_requests_total",
            "provider" => token.provider.to_string(),
            "outcome" => "failure",
            "kind" => kind.as_str()
        )
        .increment(1);
        histogram!("matchday_provider_response_seconds", "provider" => token.provider.to_string())
            .record(elapsed.as_secs_f64());
        warn!(provider = %token.provider, kind = %kind, error = %message, "request failed");
        elapsed
    }

    // ========== Statistics ==========

    /// Returns the statistics of one provider, or `None` if it is unknown.
    #[must_use]
    pub fn provider_stats(&self, provider: &str) -> Option<ProviderStats> {
        self.providers.get(provider).map(|metrics| metrics.stats(provider))
    }

    fn all_stats(&self) -> Vec<ProviderStats> {
        let mut stats: Vec<ProviderStats> =
            self.providers.iter().map(|entry| entry.value().stats(entry.key())).collect();
        stats.sort_by(|a, b| a.provider.cmp(&b.provider));
        stats
    }

    /// Builds the per-provider listing plus aggregate statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn summary(&self) -> MetricsSummary {
        let providers = self.all_stats();

        let mut pooled = LatencyWindow::new(self.config.window_size * providers.len().max(1));
        for entry in self.providers.iter() {
            for sample in entry.value().window.samples() {
                pooled.record(sample);
            }
        }

        let total_requests: u64 = providers.iter().map(|p| p.total_requests).sum();
        let total_successful: u64 = providers.iter().map(|p| p.successful_requests).sum();
        let total_failed: u64 = providers.iter().map(|p| p.failed_requests).sum();
        let (overall_success_rate, overall_failure_rate) = if total_requests == 0 {
            (0.0, 0.0)
        } else {
            let total = total_requests as f64;
            (total_successful as f64 / total * 100.0, total_failed as f64 / total * 100.0)
        };

        let sampled: Vec<f64> = providers
            .iter()
            .filter(|p| p.sample_count > 0)
            .map(|p| p.average_response_time)
            .collect();
        let average_response_time = if sampled.is_empty() {
            0.0
        } else {
            sampled.iter().sum::<f64>() / sampled.len() as f64
        };

        let mut ranking: Vec<ProviderRanking> = providers
            .iter()
            .filter(|p| p.total_requests > 0)
            .map(|p| ProviderRanking {
                provider: p.provider.clone(),
                success_rate: p.success_rate,
                average_response_time: p.average_response_time,
                requests_per_minute: p.requests_per_minute,
            })
            .collect();
        ranking.sort_by(|a, b| {
            b.success_rate.total_cmp(&a.success_rate).then_with(|| a.provider.cmp(&b.provider))
        });

        let now = Instant::now();
        let recent_events = self
            .events
            .lock()
            .iter()
            .filter(|e| now.saturating_duration_since(e.raised_at) < RECENT_EVENTS_WINDOW)
            .count();

        MetricsSummary {
            generated_at: Utc::now(),
            total_providers: providers.len(),
            total_requests,
            total_successful,
            total_failed,
            overall_success_rate,
            overall_failure_rate,
            average_response_time,
            median_response_time: pooled.median(),
            p95_response_time: pooled.p95(),
            requests_per_minute: providers.iter().map(|p| p.requests_per_minute).sum(),
            recent_events,
            providers,
            ranking,
        }
    }

    // ========== Thresholds ==========

    pub fn add_threshold(&self, threshold: Threshold) {
        info!(
            metric = %threshold.metric,
            operator = %threshold.operator,
            value = threshold.value,
            severity = %threshold.severity,
            "threshold added"
        );
        self.thresholds.write().push(threshold);
    }

    #[must_use]
    pub fn thresholds(&self) -> Vec<Threshold> {
        self.thresholds.read().clone()
    }

    /// Registers a callback invoked for every threshold event.
    pub fn add_event_callback(&self, callback: EventCallback) {
        self.callbacks.write().push(callback);
    }

    /// Runs one threshold evaluation pass and returns the events it raised.
    ///
    /// Providers without traffic are skipped. Old events are pruned first.
    pub fn evaluate_thresholds(&self) -> Vec<ThresholdEvent> {
        let now = Instant::now();
        let thresholds = self.thresholds();
        let active: Vec<ProviderStats> =
            self.all_stats().into_iter().filter(|p| p.total_requests > 0).collect();

        let mut raised = Vec::new();
        {
            let mut log = self.events.lock();
            log.prune(now);

            for stats in &active {
                for threshold in &thresholds {
                    let value = stats.metric(threshold.metric);
                    if !threshold.operator.holds(value, threshold.value) {
                        continue;
                    }
                    if !log.try_fire(&stats.provider, threshold, now) {
                        debug!(
                            provider = %stats.provider,
                            metric = %threshold.metric,
                            "threshold breached but in cooldown"
                        );
                        continue;
                    }

                    let event = ThresholdEvent {
                        provider: stats.provider.clone(),
                        metric: threshold.metric,
                        operator: threshold.operator,
                        threshold: threshold.value,
                        value,
                        severity: threshold.severity,
                        message: format!(
                            "provider {}: {} {} {} (current: {value:.2})",
                            stats.provider, threshold.metric, threshold.operator, threshold.value
                        ),
                        timestamp: Utc::now(),
                        raised_at: now,
                    };
                    log.push(event.clone());
                    raised.push(event);
                }
            }
        }

        for event in &raised {
            log_event(event);
            self.dispatch(event);
        }
        raised
    }

    fn dispatch(&self, event: &ThresholdEvent) {
        let callbacks = self.callbacks.read().clone();
        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                error!(provider = %event.provider, metric = %event.metric, "threshold callback panicked");
            }
        }
    }

    /// Returns retained threshold events matching `filter`, oldest first.
    #[must_use]
    pub fn events(&self, filter: &EventFilter) -> Vec<ThresholdEvent> {
        let now = Instant::now();
        let lookback = Duration::from_secs(filter.hours.saturating_mul(3600));
        self.events
            .lock()
            .iter()
            .filter(|e| now.saturating_duration_since(e.raised_at) <= lookback)
            .filter(|e| filter.severity.map_or(true, |s| e.severity == s))
            .filter(|e| filter.provider.as_deref().map_or(true, |p| e.provider == p))
            .cloned()
            .collect()
    }

    /// Spawns the periodic threshold monitor.
    #[must_use]
    pub fn start_threshold_monitor(
        self: &Arc<Self>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let collector = Arc::clone(self);
        let interval = self.config.evaluation_interval();

        tokio::spawn(async move {
            info!(interval_seconds = interval.as_secs(), "starting threshold monitor");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("threshold monitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let raised = collector.evaluate_thresholds();
                        debug!(raised = raised.len(), "threshold evaluation completed");
                    }
                }
            }
        })
    }

    // ========== Export ==========

    /// Serializes the summary as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns the serializer error if the summary cannot be encoded.
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.summary())
    }

    /// Renders the per-provider listing as CSV.
    #[must_use]
    pub fn export_csv(&self) -> String {
        let mut out = String::from(
            "provider,total_requests,success_rate,average_response_time,requests_per_minute\n",
        );
        for stats in self.all_stats() {
            let _ = writeln!(
                out,
                "{},{},{:.2},{:.3},{:.2}",
                stats.provider,
                stats.total_requests,
                stats.success_rate,
                stats.average_response_time,
                stats.requests_per_minute
            );
        }
        out
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new(MetricsConfig::default())
    }
}

fn log_event(event: &ThresholdEvent) {
    match event.severity {
        Severity::Info | Severity::Warning => warn!(
            provider = %event.provider,
            metric = %event.metric,
            value = event.value,
            threshold = event.threshold,
            severity = %event.severity,
            "{}", event.message
        ),
        Severity::Error | Severity::Critical => error!(
            provider = %event.provider,
            metric = %event.metric,
            value = event.value,
            threshold = event.threshold,
            severity = %event.severity,
            "{}", event.message
        ),
    }
}
