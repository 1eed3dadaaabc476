//! Configuration, statistics and event types for the metrics collector.

use super::ProviderTable;
use crate::types::{Comparator, FailureKind, Severity};
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::debug;

/// A per-provider statistic that thresholds can be set on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Percentage of requests that succeeded.
    SuccessRate,
    /// Percentage of requests that failed.
    FailureRate,
    /// Mean response time in seconds.
    AverageResponseTime,
    MedianResponseTime,
    P95ResponseTime,
    RequestsPerMinute,
}

impl MetricKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SuccessRate => "success_rate",
            Self::FailureRate => "failure_rate",
            Self::AverageResponseTime => "average_response_time",
            Self::MedianResponseTime => "median_response_time",
            Self::P95ResponseTime => "p95_response_time",
            Self::RequestsPerMinute => "requests_per_minute",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold evaluated per provider by the periodic threshold monitor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Threshold {
    pub metric: MetricKind,
    pub operator: Comparator,
    pub value: f64,
    #[serde(default = "default_threshold_severity")]
    pub severity: Severity,
    /// Minimum seconds between two events for the same provider and threshold.
    #[serde(default = "default_threshold_cooldown")]
    pub cooldown_seconds: u64,
}

fn default_threshold_severity() -> Severity {
    Severity::Warning
}

fn default_threshold_cooldown() -> u64 {
    300
}

impl Threshold {
    #[must_use]
    pub fn new(metric: MetricKind, operator: Comparator, value: f64, severity: Severity) -> Self {
        Self {
            metric,
            operator,
            value,
            severity,
            cooldown_seconds: default_threshold_cooldown(),
        }
    }

    #[must_use]
    pub fn with_cooldown(mut self, cooldown_seconds: u64) -> Self {
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// The stock threshold set: success rate, mean response time and failure rate, each
    /// at warning, error and critical levels.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        use Comparator::{GreaterThan, LessThan};
        use MetricKind::{AverageResponseTime, FailureRate, SuccessRate};
        use Severity::{Critical, Error, Warning};

        vec![
            Self::new(SuccessRate, LessThan, 80.0, Warning),
            Self::new(SuccessRate, LessThan, 60.0, Error),
            Self::new(SuccessRate, LessThan, 40.0, Critical),
            Self::new(AverageResponseTime, GreaterThan, 5.0, Warning),
            Self::new(AverageResponseTime, GreaterThan, 10.0, Error),
            Self::new(AverageResponseTime, GreaterThan, 20.0, Critical),
            Self::new(FailureRate, GreaterThan, 20.0, Warning),
            Self::new(FailureRate, GreaterThan, 40.0, Error),
            Self::new(FailureRate, GreaterThan, 60.0, Critical),
        ]
    }
}

/// Settings for the metrics collector and its threshold monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Response-time samples kept per provider (default: 1000).
    pub window_size: usize,
    /// Interval of the threshold monitor (default: 30 seconds).
    pub evaluation_interval_seconds: u64,
    /// Threshold events older than this are dropped (default: 24 hours).
    pub event_retention_hours: u64,
    /// Hard cap on retained threshold events (default: 1000).
    pub max_events: usize,
    pub thresholds: Vec<Threshold>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_size: 1000,
            evaluation_interval_seconds: 30,
            event_retention_hours: 24,
            max_events: 1000,
            thresholds: Threshold::defaults(),
        }
    }
}

impl MetricsConfig {
    #[must_use]
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_seconds)
    }

    #[must_use]
    pub fn event_retention(&self) -> Duration {
        Duration::from_secs(self.event_retention_hours.saturating_mul(3600))
    }
}

/// Handle returned by [`MetricsCollector::record_start`](super::MetricsCollector::record_start).
///
/// Consumed by exactly one `record_success` or `record_failure` call. Dropping it
/// unconsumed records the attempt as an abandoned failure.
#[must_use = "a request token must be completed with record_success or record_failure"]
pub struct RequestToken {
    pub(crate) provider: Arc<str>,
    pub(crate) started_at: Instant,
    /// Cleared once an outcome is recorded.
    pub(crate) table: Option<Arc<ProviderTable>>,
}

impl fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestToken")
            .field("provider", &self.provider)
            .field("started_at", &self.started_at)
            .field("pending", &self.table.is_some())
            .finish()
    }
}

impl Drop for RequestToken {
    fn drop(&mut self) {
        let Some(table) = self.table.take() else {
            return;
        };
        if let Some(mut metrics) = table.get_mut(self.provider.as_ref()) {
            metrics.record_abandoned();
        }
        counter!(
            "matchday_provider_requests_total",
            "provider" => self.provider.to_string(),
            "outcome" => "abandoned"
        )
        .increment(1);
        debug!(provider = %self.provider, "request token dropped without an outcome");
    }
}

impl RequestToken {
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }
}

/// Derived statistics for one provider.
///
/// Rates are percentages; times are in seconds. Everything is `0.0` for a provider that
/// has not been called yet.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStats {
    pub provider: String,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub in_flight: u64,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub average_response_time: f64,
    pub median_response_time: f64,
    pub p95_response_time: f64,
    pub requests_per_minute: f64,
    pub sample_count: usize,
    pub error_counts: BTreeMap<FailureKind, u64>,
    pub last_error: Option<String>,
}

impl ProviderStats {
    /// Returns the value of `metric` for this provider.
    #[must_use]
    pub fn metric(&self, metric: MetricKind) -> f64 {
        match metric {
            MetricKind::SuccessRate => self.success_rate,
            MetricKind::FailureRate => self.failure_rate,
            MetricKind::AverageResponseTime => self.average_response_time,
            MetricKind::MedianResponseTime => self.median_response_time,
            MetricKind::P95ResponseTime => self.p95_response_time,
            MetricKind::RequestsPerMinute => self.requests_per_minute,
        }
    }
}

/// One entry of the performance ranking.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderRanking {
    pub provider: String,
    pub success_rate: f64,
    pub average_response_time: f64,
    pub requests_per_minute: f64,
}

/// Aggregate view across all providers.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub generated_at: DateTime<Utc>,
    pub total_providers: usize,
    pub total_requests: u64,
    pub total_successful: u64,
    pub total_failed: u64,
    pub overall_success_rate: f64,
    pub overall_failure_rate: f64,
    /// Mean of the per-provider average response times (providers with samples only).
    pub average_response_time: f64,
    /// Median over the pooled samples of every provider.
    pub median_response_time: f64,
    /// p95 over the pooled samples of every provider.
    pub p95_response_time: f64,
    pub requests_per_minute: f64,
    /// Threshold events raised in the last hour.
    pub recent_events: usize,
    /// Every known provider, sorted by name; idle providers are listed at 0%.
    pub providers: Vec<ProviderStats>,
    /// Providers with traffic, best success rate first.
    pub ranking: Vec<ProviderRanking>,
}

/// A threshold breach for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct ThresholdEvent {
    pub provider: String,
    pub metric: MetricKind,
    pub operator: Comparator,
    pub threshold: f64,
    pub value: f64,
    pub severity: Severity,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) raised_at: Instant,
}

/// Filter for [`MetricsCollector::events`](super::MetricsCollector::events).
#[derive(Debug, Clone)]
pub struct EventFilter {
    pub severity: Option<Severity>,
    pub provider: Option<String>,
    /// Look-back window in hours (default: 24).
    pub hours: u64,
}

impl Default for EventFilter {
    fn default() -> Self {
        Self { severity: None, provider: None, hours: 24 }
    }
}

/// Callback invoked for every threshold event.
pub type EventCallback = Arc<dyn Fn(&ThresholdEvent) + Send + Sync>;
