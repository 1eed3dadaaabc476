use super::{
    config::{ProviderConfig, SelectorConfig},
    errors::{ProviderError, SelectorError},
    record::{FailureEffect, ProviderRecord, ProviderStatus},
    scoring,
};
use crate::{metrics::MetricsCollector, types::FailureKind};
use chrono::{DateTime, Utc};
use metrics::counter;
use parking_lot::RwLock;
use serde::Serialize;
use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Provider name reported when no provider was eligible at call start.
pub const NO_PROVIDER: &str = "none";
/// Provider name reported when every attempt failed.
pub const ALL_FAILED: &str = "all_failed";

/// One failed attempt within an `execute_with_fallback` call.
#[derive(Debug, Clone)]
pub struct AttemptError {
    pub provider: String,
    pub error: ProviderError,
}

/// Result of [`ProviderSelector::execute_with_fallback`].
#[derive(Debug)]
pub enum FallbackOutcome<T> {
    Success { value: T, provider: String, attempts: usize },
    /// No provider was eligible when the call started.
    NoneAvailable,
    /// Every eligible provider was tried once and failed.
    Exhausted { errors: Vec<AttemptError> },
}

impl<T> FallbackOutcome<T> {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// The provider that served the call, or `"none"` / `"all_failed"`.
    #[must_use]
    pub fn provider_used(&self) -> &str {
        match self {
            Self::Success { provider, .. } => provider,
            Self::NoneAvailable => NO_PROVIDER,
            Self::Exhausted { .. } => ALL_FAILED,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Success { value, .. } => Some(value),
            Self::NoneAvailable | Self::Exhausted { .. } => None,
        }
    }
}

/// Status of one provider as reported by [`ProviderSelector::status_report`].
#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatusEntry {
    pub name: String,
    pub priority: u32,
    pub status: ProviderStatus,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub score: i64,
    pub eligible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub total_providers: usize,
    pub total_failures: u64,
    pub active: usize,
    pub failing: usize,
    pub rate_limited: usize,
    pub disabled: usize,
    /// Sorted by name.
    pub providers: Vec<ProviderStatusEntry>,
}

/// Chooses providers by score and runs operations with fallback across them.
///
/// All provider records sit behind one lock; every read-modify-write of a record happens
/// inside a single acquisition and no lock is held across an `.await`.
pub struct ProviderSelector {
    records: RwLock<HashMap<Arc<str>, ProviderRecord>>,
    config: SelectorConfig,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ProviderSelector {
    #[must_use]
    pub fn new(config: SelectorConfig) -> Self {
        Self { records: RwLock::new(HashMap::new()), config, metrics: None }
    }

    /// Records every attempt made by `execute_with_fallback` into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    // ========== Registration ==========

    /// Registers a provider in the `Active` state.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::DuplicateProvider`] if the name is taken and
    /// [`SelectorError::InvalidConfig`] for an empty name or `max_failures == 0`.
    pub fn register(&self, config: &ProviderConfig) -> Result<(), SelectorError> {
        if config.name.trim().is_empty() {
            return Err(SelectorError::InvalidConfig("provider name is empty".to_string()));
        }
        if config.max_failures == 0 {
            return Err(SelectorError::InvalidConfig(format!(
                "provider {}: max_failures must be greater than 0",
                config.name
            )));
        }

        {
            let mut records = self.records.write();
            if records.contains_key(config.name.as_str()) {
                return Err(SelectorError::DuplicateProvider(config.name.clone()));
            }
            let record = ProviderRecord::new(config);
            records.insert(Arc::clone(&record.name), record);
        }

        if let Some(metrics) = &self.metrics {
            metrics.register_provider(&config.name);
        }
        info!(
            provider = %config.name,
            priority = config.priority,
            max_failures = config.max_failures,
            retry_after_secs = config.retry_after_seconds,
            "provider registered"
        );
        Ok(())
    }

    /// Removes a provider. Returns `true` if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.records.write().remove(name).is_some();
        if removed {
            info!(provider = %name, "provider unregistered");
        }
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    #[must_use]
    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.records.read().get(name).map(|r| r.status)
    }

    /// Takes a provider out of selection until [`enable`](Self::enable) is called.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::UnknownProvider`] if the provider is not registered.
    pub fn disable(&self, name: &str) -> Result<(), SelectorError> {
        self.set_manual_status(name, ProviderStatus::Disabled)
    }

    /// Returns a disabled provider to `Active`.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::UnknownProvider`] if the provider is not registered.
    pub fn enable(&self, name: &str) -> Result<(), SelectorError> {
        self.set_manual_status(name, ProviderStatus::Active)
    }

    fn set_manual_status(&self, name: &str, status: ProviderStatus) -> Result<(), SelectorError> {
        let mut records = self.records.write();
        let record =
            records.get_mut(name).ok_or_else(|| SelectorError::UnknownProvider(name.to_string()))?;
        let previous = record.status;
        record.status = status;
        if status == ProviderStatus::Active {
            record.consecutive_failures = 0;
        }
        info!(provider = %name, from = %previous, to = %status, "provider status changed manually");
        Ok(())
    }

    // ========== Outcome recording ==========

    /// Marks a successful call: resets the failure count and returns the provider to
    /// `Active`. Returns `false` for an unknown provider.
    pub fn record_success(&self, name: &str) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(name) else {
            return false;
        };
        let previous = record.status;
        record.on_success(Instant::now());
        if previous != record.status {
            info!(provider = %name, from = %previous, "provider recovered");
        } else {
            debug!(provider = %name, "success recorded");
        }
        true
    }

    /// Records a failed call of the given kind. Returns `false` for an unknown provider.
    pub fn record_failure(&self, name: &str, kind: FailureKind) -> bool {
        self.record_failure_with_hint(name, kind, None)
    }

    fn record_failure_with_hint(
        &self,
        name: &str,
        kind: FailureKind,
        retry_hint: Option<Duration>,
    ) -> bool {
        let mut records = self.records.write();
        let Some(record) = records.get_mut(name) else {
            return false;
        };

        match record.on_failure(kind, retry_hint, Instant::now()) {
            FailureEffect::RateLimited => {
                counter!("matchday_provider_rate_limited_total", "provider" => name.to_string())
                    .increment(1);
                warn!(
                    provider = %name,
                    retry_after_secs = record.rate_limit_window.as_secs(),
                    "provider rate limited"
                );
            }
            FailureEffect::TrippedFailing => {
                counter!("matchday_provider_failing_total", "provider" => name.to_string())
                    .increment(1);
                error!(
                    provider = %name,
                    failures = record.consecutive_failures,
                    retry_after_secs = record.retry_after.as_secs(),
                    "provider marked failing"
                );
            }
            FailureEffect::Counted => {
                warn!(
                    provider = %name,
                    kind = %kind,
                    failures = record.consecutive_failures,
                    max_failures = record.max_failures,
                    "provider failure recorded"
                );
            }
        }
        true
    }

    // ========== Selection ==========

    /// Eligible providers by descending score at `now`.
    fn ranked_at(&self, now: Instant) -> Vec<Arc<str>> {
        let records = self.records.read();
        let mut candidates: Vec<(&ProviderRecord, i64)> = records
            .values()
            .filter(|r| r.is_eligible(now))
            .map(|r| (r, scoring::score_at(r, now)))
            .collect();
        candidates.sort_by(|a, b| scoring::compare(*a, *b));
        candidates.into_iter().map(|(r, _)| Arc::clone(&r.name)).collect()
    }

    /// Eligible provider names, best first.
    #[must_use]
    pub fn ranked_providers(&self) -> Vec<String> {
        self.ranked_at(Instant::now()).iter().map(ToString::to_string).collect()
    }

    /// Returns the highest-scoring eligible provider for `operation`, if any.
    #[must_use]
    pub fn best_provider(&self, operation: &str) -> Option<String> {
        let best = self.ranked_at(Instant::now()).into_iter().next().map(|name| name.to_string());
        debug!(operation = %operation, provider = ?best, "best provider selected");
        best
    }

    /// Runs `operation_fn` against providers in descending score order until one succeeds.
    ///
    /// The order is computed once when the call starts and each provider is tried at
    /// most once. Each attempt's bookkeeping is committed before the backoff sleep, so a
    /// caller dropping the future between attempts leaves consistent state.
    ///
    /// # Errors
    ///
    /// Returns [`SelectorError::NoProvidersRegistered`] if nothing was ever registered.
    /// Exhaustion is reported as [`FallbackOutcome::Exhausted`], not as an error.
    pub async fn execute_with_fallback<T, F, Fut>(
        &self,
        operation: &str,
        mut operation_fn: F,
    ) -> Result<FallbackOutcome<T>, SelectorError>
    where
        F: FnMut(Arc<str>) -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        if self.is_empty() {
            return Err(SelectorError::NoProvidersRegistered);
        }

        let candidates = self.ranked_at(Instant::now());
        if candidates.is_empty() {
            counter!("matchday_fallback_total", "outcome" => "none_available").increment(1);
            error!(operation = %operation, "no provider available");
            return Ok(FallbackOutcome::NoneAvailable);
        }

        let mut errors = Vec::new();
        let total = candidates.len();

        for (index, provider) in candidates.into_iter().enumerate() {
            let attempt = index + 1;
            info!(operation = %operation, provider = %provider, attempt, "attempting operation");

            let token = self.metrics.as_ref().map(|m| m.record_start(&provider));
            let result = operation_fn(Arc::clone(&provider)).await;

            match result {
                Ok(value) => {
                    if let (Some(metrics), Some(token)) = (&self.metrics, token) {
                        metrics.record_success(token);
                    }
                    self.record_success(&provider);
                    counter!("matchday_fallback_total", "outcome" => "success").increment(1);
                    info!(operation = %operation, provider = %provider, attempt, "operation succeeded");
                    return Ok(FallbackOutcome::Success {
                        value,
                        provider: provider.to_string(),
                        attempts: attempt,
                    });
                }
                Err(err) => {
                    let kind = err.kind();
                    if let (Some(metrics), Some(token)) = (&self.metrics, token) {
                        metrics.record_failure(token, kind, &err.to_string());
                    }
                    self.record_failure_with_hint(&provider, kind, err.retry_after());
                    warn!(
                        operation = %operation,
                        provider = %provider,
                        attempt,
                        kind = %kind,
                        error = %err,
                        "operation attempt failed"
                    );
                    errors.push(AttemptError { provider: provider.to_string(), error: err });

                    if attempt < total {
                        let failed = u32::try_from(attempt).unwrap_or(u32::MAX);
                        let delay = self.config.backoff(failed);
                        debug!(operation = %operation, delay_ms = delay.as_millis(), "backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        counter!("matchday_fallback_total", "outcome" => "exhausted").increment(1);
        error!(operation = %operation, attempts = errors.len(), "all providers failed");
        Ok(FallbackOutcome::Exhausted { errors })
    }

    // ========== Health ==========

    /// Reactivates every failing or rate-limited provider whose retry window elapsed.
    /// Returns the reactivated names.
    pub fn reactivate_due(&self) -> Vec<String> {
        let now = Instant::now();
        let mut reactivated = Vec::new();
        let mut records = self.records.write();
        for record in records.values_mut() {
            if let Some(previous) = record.reactivate_if_due(now) {
                info!(provider = %record.name, from = %previous, "provider reactivated");
                reactivated.push(record.name.to_string());
            }
        }
        reactivated.sort();
        reactivated
    }

    #[must_use]
    pub fn status_report(&self) -> StatusReport {
        let now = Instant::now();
        let records = self.records.read();

        let mut providers: Vec<ProviderStatusEntry> = records
            .values()
            .map(|r| ProviderStatusEntry {
                name: r.name.to_string(),
                priority: r.priority,
                status: r.status,
                consecutive_failures: r.consecutive_failures,
                total_failures: r.total_failures,
                last_success: r.last_success_at,
                last_failure: r.last_failure_at,
                score: scoring::score_at(r, now),
                eligible: r.is_eligible(now),
            })
            .collect();
        providers.sort_by(|a, b| a.name.cmp(&b.name));

        let count = |status| providers.iter().filter(|p| p.status == status).count();
        StatusReport {
            total_providers: providers.len(),
            total_failures: providers.iter().map(|p| p.total_failures).sum(),
            active: count(ProviderStatus::Active),
            failing: count(ProviderStatus::Failing),
            rate_limited: count(ProviderStatus::RateLimited),
            disabled: count(ProviderStatus::Disabled),
            providers,
        }
    }
}

impl Default for ProviderSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}
