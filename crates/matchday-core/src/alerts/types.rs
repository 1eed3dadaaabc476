//! Alert type definitions.

use crate::{
    metrics::MetricsSummary,
    types::{Comparator, Severity},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, time::Duration};
use thiserror::Error;
use tokio::time::Instant;

/// Value an alert rule is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    /// Overall success rate across providers, in percent.
    SuccessRate,
    /// Mean of the per-provider average response times, in seconds.
    ResponseTime,
    /// `100 - success_rate`.
    ErrorRate,
    /// Externally injected signal, looked up by name.
    Custom(String),
    /// Operator-triggered alerts.
    Manual,
}

impl fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuccessRate => f.write_str("success_rate"),
            Self::ResponseTime => f.write_str("response_time"),
            Self::ErrorRate => f.write_str("error_rate"),
            Self::Custom(name) => write!(f, "custom:{name}"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// Current status of an alert.
///
/// `Active` -> `Acknowledged` | `Escalated` | `Resolved`, `Acknowledged` -> `Resolved`,
/// `Escalated` -> `Resolved`. `Resolved` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
    Escalated,
}

impl AlertStatus {
    pub const ALL: [Self; 4] = [Self::Active, Self::Acknowledged, Self::Resolved, Self::Escalated];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Acknowledged => "acknowledged",
            Self::Resolved => "resolved",
            Self::Escalated => "escalated",
        }
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlertError {
    #[error("alert not found: {0}")]
    NotFound(String),

    #[error("cannot {action} an alert that is {from}")]
    InvalidTransition { from: AlertStatus, action: &'static str },

    #[error("alert rule already exists: {0}")]
    DuplicateRule(String),

    #[error("unknown alert rule: {0}")]
    UnknownRule(String),
}

/// A rule defining when to create alerts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    /// Unique rule name.
    pub name: String,
    pub metric: AlertMetric,
    pub operator: Comparator,
    pub threshold: f64,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Minimum seconds between two alerts of this rule (default: 300).
    #[serde(default = "default_cooldown")]
    pub cooldown_seconds: u64,
    /// Escalations after which an alert becomes `Escalated` (default: 3).
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    /// Seconds between automatic escalations of an unacknowledged alert (default: 1800).
    #[serde(default = "default_escalation_delay")]
    pub escalation_delay_seconds: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_cooldown() -> u64 {
    300
}

fn default_escalation_threshold() -> u32 {
    3
}

fn default_escalation_delay() -> u64 {
    1800
}

fn default_enabled() -> bool {
    true
}

impl AlertRule {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        metric: AlertMetric,
        operator: Comparator,
        threshold: f64,
        severity: Severity,
    ) -> Self {
        Self {
            name: name.into(),
            metric,
            operator,
            threshold,
            severity,
            description: String::new(),
            cooldown_seconds: default_cooldown(),
            escalation_threshold: default_escalation_threshold(),
            escalation_delay_seconds: default_escalation_delay(),
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn with_cooldown(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_escalation(mut self, threshold: u32, delay_seconds: u64) -> Self {
        self.escalation_threshold = threshold;
        self.escalation_delay_seconds = delay_seconds;
        self
    }

    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    #[must_use]
    pub fn evaluate(&self, value: f64) -> bool {
        self.operator.holds(value, self.threshold)
    }

    /// Success-rate, response-time and error-rate rules at warning and critical level.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        use AlertMetric::{ErrorRate, ResponseTime, SuccessRate};
        use Comparator::{GreaterThan, LessThan};

        vec![
            Self::new("low_success_rate", SuccessRate, LessThan, 80.0, Severity::Warning)
                .with_description("success rate below 80%"),
            Self::new("critical_success_rate", SuccessRate, LessThan, 60.0, Severity::Critical)
                .with_description("success rate below 60%")
                .with_cooldown(60)
                .with_escalation(2, default_escalation_delay()),
            Self::new("high_response_time", ResponseTime, GreaterThan, 2.0, Severity::Warning)
                .with_description("average response time above 2 seconds"),
            Self::new("critical_response_time", ResponseTime, GreaterThan, 5.0, Severity::Critical)
                .with_description("average response time above 5 seconds")
                .with_cooldown(60),
            Self::new("high_error_rate", ErrorRate, GreaterThan, 20.0, Severity::Warning)
                .with_description("error rate above 20%"),
            Self::new("critical_error_rate", ErrorRate, GreaterThan, 40.0, Severity::Critical)
                .with_description("error rate above 40%")
                .with_cooldown(60)
                .with_escalation(2, default_escalation_delay()),
        ]
    }

    /// Formats the message of an alert raised by this rule at `value`.
    #[must_use]
    pub fn message_for(&self, value: f64) -> String {
        match &self.metric {
            AlertMetric::SuccessRate => {
                format!("success rate at {value:.1}% (threshold: {}%)", self.threshold)
            }
            AlertMetric::ResponseTime => {
                format!("response time at {value:.3}s (threshold: {}s)", self.threshold)
            }
            AlertMetric::ErrorRate => {
                format!("error rate at {value:.1}% (threshold: {}%)", self.threshold)
            }
            AlertMetric::Custom(_) | AlertMetric::Manual => {
                format!("{} = {value} {} {}", self.metric, self.operator, self.threshold)
            }
        }
    }
}

/// Metric values one evaluation pass runs against. A rule whose metric has no value is
/// skipped.
#[derive(Debug, Clone, Default)]
pub struct MetricValues {
    pub success_rate: Option<f64>,
    pub response_time: Option<f64>,
    pub custom: HashMap<String, f64>,
}

impl MetricValues {
    /// Values derived from a metrics summary. Empty when nothing has been recorded yet.
    #[must_use]
    pub fn from_summary(summary: &MetricsSummary) -> Self {
        if summary.total_requests == 0 {
            return Self::default();
        }
        Self {
            success_rate: Some(summary.overall_success_rate),
            response_time: Some(summary.average_response_time),
            custom: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_success_rate(mut self, value: f64) -> Self {
        self.success_rate = Some(value);
        self
    }

    #[must_use]
    pub fn with_response_time(mut self, seconds: f64) -> Self {
        self.response_time = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_custom(mut self, name: impl Into<String>, value: f64) -> Self {
        self.custom.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn value(&self, metric: &AlertMetric) -> Option<f64> {
        match metric {
            AlertMetric::SuccessRate => self.success_rate,
            AlertMetric::ResponseTime => self.response_time,
            AlertMetric::ErrorRate => self.success_rate.map(|rate| 100.0 - rate),
            AlertMetric::Custom(name) => self.custom.get(name).copied(),
            AlertMetric::Manual => None,
        }
    }
}

/// An active or historical alert instance.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub id: String,
    pub rule_name: String,
    pub metric: AlertMetric,
    pub operator: Comparator,
    pub threshold: f64,
    /// Value that triggered the alert.
    pub value: f64,
    pub severity: Severity,
    pub message: String,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
    pub escalation_count: u32,
    pub escalation_threshold: u32,
    pub escalation_delay_seconds: u64,
    pub last_escalation: Option<DateTime<Utc>>,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub(crate) raised_at: Instant,
    #[serde(skip)]
    pub(crate) escalated_at: Option<Instant>,
}

impl Alert {
    #[must_use]
    pub fn new(id: String, rule: &AlertRule, value: f64, message: String) -> Self {
        Self {
            id,
            rule_name: rule.name.clone(),
            metric: rule.metric.clone(),
            operator: rule.operator,
            threshold: rule.threshold,
            value,
            severity: rule.severity,
            message,
            status: AlertStatus::Active,
            created_at: Utc::now(),
            escalation_count: 0,
            escalation_threshold: rule.escalation_threshold,
            escalation_delay_seconds: rule.escalation_delay_seconds,
            last_escalation: None,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
            raised_at: Instant::now(),
            escalated_at: None,
        }
    }

    /// Not yet resolved.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status != AlertStatus::Resolved
    }

    /// Active or acknowledged. Escalated alerts wait for an explicit resolve.
    #[must_use]
    pub fn auto_resolvable(&self) -> bool {
        matches!(self.status, AlertStatus::Active | AlertStatus::Acknowledged)
    }

    /// Active or escalated: still firing and not handled by an operator.
    #[must_use]
    pub fn is_firing(&self) -> bool {
        matches!(self.status, AlertStatus::Active | AlertStatus::Escalated)
    }

    #[must_use]
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.raised_at)
    }

    /// # Errors
    ///
    /// Only an `Active` alert can be acknowledged.
    pub fn acknowledge(&mut self, actor: &str) -> Result<(), AlertError> {
        if self.status != AlertStatus::Active {
            return Err(AlertError::InvalidTransition { from: self.status, action: "acknowledge" });
        }
        self.status = AlertStatus::Acknowledged;
        self.acknowledged_by = Some(actor.to_string());
        self.acknowledged_at = Some(Utc::now());
        Ok(())
    }

    /// # Errors
    ///
    /// A resolved alert cannot be resolved again.
    pub fn resolve(&mut self, actor: &str) -> Result<(), AlertError> {
        if self.status == AlertStatus::Resolved {
            return Err(AlertError::InvalidTransition { from: self.status, action: "resolve" });
        }
        self.status = AlertStatus::Resolved;
        self.resolved_by = Some(actor.to_string());
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    /// Increments the escalation counter. Returns `true` when this call moved the alert
    /// into `Escalated`.
    ///
    /// # Errors
    ///
    /// Acknowledged and resolved alerts cannot be escalated.
    pub fn escalate(&mut self, now: Instant) -> Result<bool, AlertError> {
        if !self.is_firing() {
            return Err(AlertError::InvalidTransition { from: self.status, action: "escalate" });
        }
        self.escalation_count += 1;
        self.escalated_at = Some(now);
        self.last_escalation = Some(Utc::now());

        let crossed = self.status == AlertStatus::Active
            && self.escalation_count >= self.escalation_threshold;
        if crossed {
            self.status = AlertStatus::Escalated;
        }
        Ok(crossed)
    }

    /// Whether the escalation delay has passed since creation or the last escalation.
    #[must_use]
    pub fn escalation_due(&self, now: Instant) -> bool {
        let since = self.escalated_at.unwrap_or(self.raised_at);
        now.saturating_duration_since(since) >= Duration::from_secs(self.escalation_delay_seconds)
    }
}

/// Counts reported by [`AlertManager::get_alert_stats`](super::AlertManager::get_alert_stats).
#[derive(Debug, Clone, Serialize)]
pub struct AlertStats {
    /// Alerts in history, resolved ones included.
    pub total_alerts: usize,
    /// Unresolved alerts.
    pub active_alerts: usize,
    /// Unresolved alerts per severity.
    pub severity_distribution: std::collections::BTreeMap<String, usize>,
    /// Alerts in history per status.
    pub status_distribution: std::collections::BTreeMap<String, usize>,
    pub rules_count: usize,
}

/// What one evaluation pass did, by alert id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationReport {
    pub created: Vec<String>,
    pub resolved: Vec<String>,
    pub escalated: Vec<String>,
}
