//! Alert management and storage.

use super::{
    config::AlertsConfig,
    notification::{Notification, NotificationSink},
    types::{
        Alert, AlertError, AlertMetric, AlertRule, AlertStats, AlertStatus, EvaluationReport,
        MetricValues,
    },
};
use crate::types::{Comparator, Severity};
use chrono::Utc;
use futures::future::join_all;
use metrics::counter;
use parking_lot::RwLock;
use serde_json::json;
use std::{
    collections::BTreeMap,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    time::Duration,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Maximum number of alerts to keep in memory, resolved ones included.
const MAX_ALERTS: usize = 1000;

/// Actor recorded on automatic resolutions.
pub const AUTO_RESOLVER: &str = "auto";

/// Callback invoked when an alert crosses its escalation threshold.
pub type EscalationCallback = Arc<dyn Fn(&Alert) + Send + Sync>;

/// Owns alert rules and alerts, and drives the alert life-cycle.
///
/// Locks are never held across a notification send; state changes are committed first
/// and notifications delivered afterwards.
pub struct AlertManager {
    alerts: RwLock<Vec<Alert>>,
    rules: RwLock<Vec<AlertRule>>,
    escalation_callbacks: RwLock<Vec<EscalationCallback>>,
    sink: Arc<dyn NotificationSink>,
    auto_resolve: bool,
}

impl AlertManager {
    /// Creates a manager with no rules.
    #[must_use]
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            alerts: RwLock::new(Vec::new()),
            rules: RwLock::new(Vec::new()),
            escalation_callbacks: RwLock::new(Vec::new()),
            sink,
            auto_resolve: true,
        }
    }

    /// Creates a manager seeded with the configured rules.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::DuplicateRule`] if two configured rules share a name.
    pub fn from_config(
        config: &AlertsConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, AlertError> {
        let manager = Self::new(sink).with_auto_resolve(config.auto_resolve);
        for rule in &config.rules {
            manager.add_rule(rule.clone())?;
        }
        Ok(manager)
    }

    #[must_use]
    pub fn with_auto_resolve(mut self, auto_resolve: bool) -> Self {
        self.auto_resolve = auto_resolve;
        self
    }

    // ========== Rule Management ==========

    /// # Errors
    ///
    /// Returns [`AlertError::DuplicateRule`] if a rule with the same name exists.
    pub fn add_rule(&self, rule: AlertRule) -> Result<(), AlertError> {
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.name == rule.name) {
            return Err(AlertError::DuplicateRule(rule.name));
        }
        info!(rule = %rule.name, metric = %rule.metric, operator = %rule.operator, threshold = rule.threshold, "alert rule added");
        rules.push(rule);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`AlertError::UnknownRule`] if no rule has this name.
    pub fn remove_rule(&self, name: &str) -> Result<AlertRule, AlertError> {
        let mut rules = self.rules.write();
        let index = rules
            .iter()
            .position(|r| r.name == name)
            .ok_or_else(|| AlertError::UnknownRule(name.to_string()))?;
        info!(rule = %name, "alert rule removed");
        Ok(rules.remove(index))
    }

    /// Toggles a rule's enabled flag. Returns the new state, or `None` for an unknown rule.
    #[must_use]
    pub fn toggle_rule(&self, name: &str) -> Option<bool> {
        let mut rules = self.rules.write();
        let rule = rules.iter_mut().find(|r| r.name == name)?;
        rule.enabled = !rule.enabled;
        info!(rule = %name, enabled = rule.enabled, "alert rule toggled");
        Some(rule.enabled)
    }

    #[must_use]
    pub fn get_rules(&self) -> Vec<AlertRule> {
        self.rules.read().clone()
    }

    #[must_use]
    pub fn get_rule(&self, name: &str) -> Option<AlertRule> {
        self.rules.read().iter().find(|r| r.name == name).cloned()
    }

    pub fn add_escalation_callback(&self, callback: EscalationCallback) {
        self.escalation_callbacks.write().push(callback);
    }

    // ========== Evaluation ==========

    /// Evaluates every enabled rule against `values`.
    ///
    /// For a rule whose condition holds, firing alerts past their escalation delay are
    /// escalated, then a new alert is created unless a firing alert of the rule is younger
    /// than the cooldown. For a rule whose condition does not hold, its active and
    /// acknowledged alerts are resolved when auto-resolve is on; escalated alerts stay
    /// open until resolved explicitly. Rules without a value are skipped.
    pub async fn evaluate(&self, values: &MetricValues) -> EvaluationReport {
        let now = Instant::now();
        let rules: Vec<AlertRule> = self.rules.read().iter().filter(|r| r.enabled).cloned().collect();

        let mut report = EvaluationReport::default();
        let mut notifications = Vec::new();
        let mut crossed = Vec::new();

        {
            let mut alerts = self.alerts.write();
            for rule in &rules {
                let Some(value) = values.value(&rule.metric) else {
                    continue;
                };

                if rule.evaluate(value) {
                    for alert in alerts.iter_mut().filter(|a| a.rule_name == rule.name && a.is_firing()) {
                        if !alert.escalation_due(now) {
                            continue;
                        }
                        if let Ok(did_cross) = alert.escalate(now) {
                            report.escalated.push(alert.id.clone());
                            log_escalation(alert);
                            if did_cross {
                                crossed.push(alert.clone());
                            }
                        }
                    }

                    let in_cooldown = alerts.iter().any(|a| {
                        a.rule_name == rule.name && a.is_firing() && a.age(now) < rule.cooldown()
                    });
                    if in_cooldown {
                        debug!(rule = %rule.name, value, "rule breached but in cooldown");
                        continue;
                    }

                    let alert =
                        Alert::new(Uuid::new_v4().to_string(), rule, value, rule.message_for(value));
                    warn!(
                        alert_id = %alert.id,
                        rule = %rule.name,
                        severity = %rule.severity,
                        value,
                        threshold = rule.threshold,
                        "{}", alert.message
                    );
                    counter!("matchday_alerts_total", "severity" => rule.severity.as_str()).increment(1);
                    notifications.push(alert_notification(&alert));
                    report.created.push(alert.id.clone());
                    store(&mut alerts, alert);
                } else if self.auto_resolve {
                    for alert in alerts.iter_mut().filter(|a| a.rule_name == rule.name && a.auto_resolvable()) {
                        if alert.resolve(AUTO_RESOLVER).is_ok() {
                            info!(alert_id = %alert.id, rule = %rule.name, value, "alert auto-resolved");
                            notifications.push(resolution_notification(alert));
                            report.resolved.push(alert.id.clone());
                        }
                    }
                }
            }
        }

        self.run_escalation_callbacks(&crossed);
        join_all(notifications.into_iter().map(|n| self.deliver(n))).await;
        report
    }

    /// Raises an alert without rule evaluation, through a zero-cooldown `manual` rule.
    pub async fn trigger_manual_alert(&self, name: &str, message: &str, severity: Severity) -> Alert {
        let rule = AlertRule::new(name, AlertMetric::Manual, Comparator::Equal, 0.0, severity)
            .with_description("manual alert")
            .with_cooldown(0);
        let alert = Alert::new(format!("manual-{}", Uuid::new_v4()), &rule, 0.0, message.to_string());

        warn!(alert_id = %alert.id, rule = %name, severity = %severity, "manual alert triggered");
        let notification = alert_notification(&alert);
        store(&mut self.alerts.write(), alert.clone());
        self.deliver(notification).await;
        alert
    }

    // ========== Alert life-cycle ==========

    /// # Errors
    ///
    /// [`AlertError::NotFound`] for an unknown id, [`AlertError::InvalidTransition`] unless
    /// the alert is `Active`.
    pub fn acknowledge(&self, id: &str, actor: &str) -> Result<(), AlertError> {
        let mut alerts = self.alerts.write();
        let alert = find_mut(&mut alerts, id)?;
        alert.acknowledge(actor)?;
        info!(alert_id = %id, rule = %alert.rule_name, actor = %actor, "alert acknowledged");
        Ok(())
    }

    /// Resolves an alert and sends a resolution notification.
    ///
    /// # Errors
    ///
    /// [`AlertError::NotFound`] for an unknown id, [`AlertError::InvalidTransition`] if it
    /// is already resolved.
    pub async fn resolve(&self, id: &str, actor: &str) -> Result<(), AlertError> {
        let notification = {
            let mut alerts = self.alerts.write();
            let alert = find_mut(&mut alerts, id)?;
            alert.resolve(actor)?;
            info!(alert_id = %id, rule = %alert.rule_name, actor = %actor, "alert resolved");
            resolution_notification(alert)
        };
        self.deliver(notification).await;
        Ok(())
    }

    /// Increments the escalation counter of an alert. Returns `true` if this call crossed
    /// the escalation threshold, in which case every escalation callback ran once.
    ///
    /// # Errors
    ///
    /// [`AlertError::NotFound`] for an unknown id, [`AlertError::InvalidTransition`] for an
    /// acknowledged or resolved alert.
    pub fn escalate(&self, id: &str) -> Result<bool, AlertError> {
        let crossed = {
            let mut alerts = self.alerts.write();
            let alert = find_mut(&mut alerts, id)?;
            let crossed = alert.escalate(Instant::now())?;
            log_escalation(alert);
            crossed.then(|| alert.clone())
        };

        match crossed {
            Some(alert) => {
                self.run_escalation_callbacks(std::slice::from_ref(&alert));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn run_escalation_callbacks(&self, alerts: &[Alert]) {
        if alerts.is_empty() {
            return;
        }
        let callbacks = self.escalation_callbacks.read().clone();
        for alert in alerts {
            counter!("matchday_alert_escalations_total", "severity" => alert.severity.as_str())
                .increment(1);
            for callback in &callbacks {
                if catch_unwind(AssertUnwindSafe(|| callback(alert))).is_err() {
                    error!(alert_id = %alert.id, "escalation callback panicked");
                }
            }
        }
    }

    async fn deliver(&self, notification: Notification) {
        let results = self.sink.send(&notification).await;
        if results.is_empty() {
            warn!(title = %notification.title, "notification sink reported no channels");
        }
        for (channel, delivered) in results {
            let outcome = if delivered { "success" } else { "failure" };
            counter!("matchday_notifications_total", "channel" => channel.clone(), "outcome" => outcome)
                .increment(1);
            if delivered {
                info!(channel = %channel, title = %notification.title, "notification delivered");
            } else {
                error!(channel = %channel, title = %notification.title, "notification delivery failed");
            }
        }
    }

    // ========== Queries ==========

    #[must_use]
    pub fn get_alert(&self, id: &str) -> Option<Alert> {
        self.alerts.read().iter().find(|a| a.id == id).cloned()
    }

    /// Every retained alert, oldest first.
    #[must_use]
    pub fn get_alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Unresolved alerts, optionally of one severity, newest first.
    #[must_use]
    pub fn get_active_alerts(&self, severity: Option<Severity>) -> Vec<Alert> {
        let mut active: Vec<Alert> = self
            .alerts
            .read()
            .iter()
            .rev()
            .filter(|a| a.is_open())
            .filter(|a| severity.map_or(true, |s| a.severity == s))
            .cloned()
            .collect();
        active.sort_by(|a, b| b.raised_at.cmp(&a.raised_at));
        active
    }

    /// Alerts raised within the last `hours`, oldest first.
    #[must_use]
    pub fn get_alert_history(&self, hours: u64) -> Vec<Alert> {
        let now = Instant::now();
        let window = Duration::from_secs(hours.saturating_mul(3600));
        self.alerts.read().iter().filter(|a| a.age(now) <= window).cloned().collect()
    }

    #[must_use]
    pub fn get_alert_stats(&self) -> AlertStats {
        let alerts = self.alerts.read();

        let mut severity_distribution: BTreeMap<String, usize> = [
            Severity::Info,
            Severity::Warning,
            Severity::Error,
            Severity::Critical,
        ]
        .iter()
        .map(|s| (s.as_str().to_string(), 0))
        .collect();
        let mut status_distribution: BTreeMap<String, usize> =
            AlertStatus::ALL.iter().map(|s| (s.as_str().to_string(), 0)).collect();

        for alert in alerts.iter() {
            *status_distribution.entry(alert.status.as_str().to_string()).or_insert(0) += 1;
            if alert.is_open() {
                *severity_distribution.entry(alert.severity.as_str().to_string()).or_insert(0) += 1;
            }
        }

        AlertStats {
            total_alerts: alerts.len(),
            active_alerts: alerts.iter().filter(|a| a.is_open()).count(),
            severity_distribution,
            status_distribution,
            rules_count: self.rules.read().len(),
        }
    }
}

/// Appends an alert, evicting resolved alerts at 90% capacity and the oldest at capacity.
fn store(alerts: &mut Vec<Alert>, alert: Alert) {
    if alerts.len() >= MAX_ALERTS * 9 / 10 {
        alerts.retain(Alert::is_open);
    }
    while alerts.len() >= MAX_ALERTS {
        alerts.remove(0);
    }
    alerts.push(alert);
}

fn find_mut<'a>(alerts: &'a mut [Alert], id: &str) -> Result<&'a mut Alert, AlertError> {
    alerts.iter_mut().find(|a| a.id == id).ok_or_else(|| AlertError::NotFound(id.to_string()))
}

fn log_escalation(alert: &Alert) {
    warn!(
        alert_id = %alert.id,
        rule = %alert.rule_name,
        escalation_count = alert.escalation_count,
        escalation_threshold = alert.escalation_threshold,
        status = %alert.status,
        "alert escalated"
    );
}

fn alert_notification(alert: &Alert) -> Notification {
    let metadata = BTreeMap::from([
        ("alert_id".to_string(), json!(alert.id)),
        ("rule".to_string(), json!(alert.rule_name)),
        ("metric".to_string(), json!(alert.metric.to_string())),
        ("value".to_string(), json!(alert.value)),
        ("threshold".to_string(), json!(alert.threshold)),
        ("operator".to_string(), json!(alert.operator.as_str())),
        ("timestamp".to_string(), json!(alert.created_at.to_rfc3339())),
    ]);
    Notification {
        title: format!("alert: {}", alert.rule_name),
        body: alert.message.clone(),
        severity: alert.severity,
        metadata,
    }
}

fn resolution_notification(alert: &Alert) -> Notification {
    let resolved_at = alert.resolved_at.unwrap_or_else(Utc::now);
    let resolved_by = alert.resolved_by.clone().unwrap_or_default();
    let duration_minutes = (resolved_at - alert.created_at).num_minutes();
    let metadata = BTreeMap::from([
        ("alert_id".to_string(), json!(alert.id)),
        ("resolved_by".to_string(), json!(resolved_by)),
        ("resolved_at".to_string(), json!(resolved_at.to_rfc3339())),
        ("duration_minutes".to_string(), json!(duration_minutes)),
    ]);
    Notification {
        title: format!("resolved: {}", alert.rule_name),
        body: format!("alert resolved by {resolved_by}"),
        severity: Severity::Info,
        metadata,
    }
}
