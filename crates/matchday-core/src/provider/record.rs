//! Per-provider circuit-breaker state.
//!
//! State machine:
//! - `Active` -> `Failing`: consecutive failures reach `max_failures`
//! - `Active`/`Failing` -> `RateLimited`: a rate-limit failure, with its own retry window
//! - `Failing`/`RateLimited` -> `Active`: a success, or the retry window elapsing
//! - any -> `Disabled` and back: manual only
//!
//! A reactivated provider keeps its consecutive-failure count, so one more failure puts
//! it straight back into `Failing`. A success resets the count.

use super::config::ProviderConfig;
use crate::types::FailureKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Active,
    Failing,
    RateLimited,
    Disabled,
}

impl ProviderStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Failing => "failing",
            Self::RateLimited => "rate_limited",
            Self::Disabled => "disabled",
        }
    }
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a recorded failure did to the provider's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureEffect {
    RateLimited,
    /// The failure threshold was reached on this failure.
    TrippedFailing,
    Counted,
}

#[derive(Debug, Clone)]
pub(crate) struct ProviderRecord {
    pub name: Arc<str>,
    pub priority: u32,
    pub max_failures: u32,
    pub retry_after: Duration,
    pub rate_limit_retry_after: Duration,
    pub status: ProviderStatus,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_failure: Option<Instant>,
    pub last_success: Option<Instant>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    /// Rate-limit window of the current episode.
    pub rate_limit_window: Duration,
}

impl ProviderRecord {
    pub fn new(config: &ProviderConfig) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            priority: config.priority,
            max_failures: config.max_failures,
            retry_after: config.retry_after(),
            rate_limit_retry_after: config.rate_limit_retry_after(),
            status: ProviderStatus::Active,
            consecutive_failures: 0,
            total_failures: 0,
            last_failure: None,
            last_success: None,
            last_failure_at: None,
            last_success_at: None,
            rate_limit_window: config.rate_limit_retry_after(),
        }
    }

    pub fn on_success(&mut self, now: Instant) {
        self.consecutive_failures = 0;
        self.last_success = Some(now);
        self.last_success_at = Some(Utc::now());
        if self.status != ProviderStatus::Disabled {
            self.status = ProviderStatus::Active;
        }
    }

    pub fn on_failure(
        &mut self,
        kind: FailureKind,
        retry_hint: Option<Duration>,
        now: Instant,
    ) -> FailureEffect {
        self.total_failures += 1;
        self.last_failure = Some(now);
        self.last_failure_at = Some(Utc::now());

        if kind.is_rate_limit() {
            self.rate_limit_window = retry_hint.unwrap_or(self.rate_limit_retry_after);
            if self.status != ProviderStatus::Disabled {
                self.status = ProviderStatus::RateLimited;
            }
            return FailureEffect::RateLimited;
        }

        self.consecutive_failures += 1;
        if self.status == ProviderStatus::Disabled {
            return FailureEffect::Counted;
        }
        if self.consecutive_failures >= self.max_failures {
            let tripped = self.status != ProviderStatus::Failing;
            self.status = ProviderStatus::Failing;
            if tripped {
                return FailureEffect::TrippedFailing;
            }
        } else if self.status == ProviderStatus::RateLimited {
            self.status = ProviderStatus::Active;
        }
        FailureEffect::Counted
    }

    /// Time since the last failure has reached the window of the current status.
    fn window_elapsed(&self, now: Instant) -> bool {
        let window = match self.status {
            ProviderStatus::Failing => self.retry_after,
            ProviderStatus::RateLimited => self.rate_limit_window,
            ProviderStatus::Active | ProviderStatus::Disabled => return true,
        };
        self.last_failure.map_or(true, |last| now.saturating_duration_since(last) >= window)
    }

    /// Whether the provider may be selected at `now`.
    pub fn is_eligible(&self, now: Instant) -> bool {
        match self.status {
            ProviderStatus::Disabled => false,
            ProviderStatus::Active => true,
            ProviderStatus::Failing | ProviderStatus::RateLimited => self.window_elapsed(now),
        }
    }

    /// Flips a failing or rate-limited provider back to active once its window elapsed.
    /// Returns the previous status when it did.
    pub fn reactivate_if_due(&mut self, now: Instant) -> Option<ProviderStatus> {
        match self.status {
            ProviderStatus::Failing | ProviderStatus::RateLimited if self.window_elapsed(now) => {
                let previous = self.status;
                self.status = ProviderStatus::Active;
                Some(previous)
            }
            _ => None,
        }
    }
}
