//! Alert life-cycle driven by metric values over time.

use crate::mock_providers::RecordingSink;
use matchday_core::{
    alerts::{AlertError, AlertManager, AlertMetric, AlertRule, AlertStatus, MetricValues},
    types::{Comparator, Severity},
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

fn success_rate_rule() -> AlertRule {
    AlertRule::new("low_success_rate", AlertMetric::SuccessRate, Comparator::LessThan, 80.0, Severity::Warning)
        .with_cooldown(300)
}

fn manager_with(rule: AlertRule) -> (AlertManager, Arc<RecordingSink>) {
    let sink = RecordingSink::new();
    let manager = AlertManager::new(sink.clone());
    manager.add_rule(rule).unwrap();
    (manager, sink)
}

fn success(rate: f64) -> MetricValues {
    MetricValues::default().with_success_rate(rate)
}

#[tokio::test(start_paused = true)]
async fn test_cooldown_then_auto_resolve() {
    let (manager, sink) = manager_with(success_rate_rule());

    let first = manager.evaluate(&success(70.0)).await;
    assert_eq!(first.created.len(), 1);
    let alert_id = first.created[0].clone();

    tokio::time::advance(Duration::from_secs(60)).await;
    let second = manager.evaluate(&success(70.0)).await;
    assert!(second.created.is_empty());
    assert_eq!(manager.get_active_alerts(None).len(), 1);

    let third = manager.evaluate(&success(95.0)).await;
    assert_eq!(third.resolved, vec![alert_id.clone()]);

    let alert = manager.get_alert(&alert_id).unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert_eq!(alert.resolved_by.as_deref(), Some("auto"));
    assert!(manager.get_active_alerts(None).is_empty());
    assert_eq!(sink.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_new_alert_after_cooldown() {
    let (manager, _) = manager_with(success_rate_rule());
    manager.evaluate(&success(70.0)).await;

    tokio::time::advance(Duration::from_secs(301)).await;
    let report = manager.evaluate(&success(65.0)).await;

    assert_eq!(report.created.len(), 1);
    let active = manager.get_active_alerts(None);
    assert_eq!(active.len(), 2);
    assert!((active[0].value - 65.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_escalation_after_repeated_breach() {
    let rule = AlertRule::new(
        "critical_success_rate",
        AlertMetric::SuccessRate,
        Comparator::LessThan,
        60.0,
        Severity::Critical,
    )
    .with_cooldown(3600)
    .with_escalation(2, 60);
    let (manager, _) = manager_with(rule);

    let escalations = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&escalations);
    manager.add_escalation_callback(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    let id = manager.evaluate(&success(40.0)).await.created[0].clone();

    tokio::time::advance(Duration::from_secs(60)).await;
    let report = manager.evaluate(&success(40.0)).await;
    assert_eq!(report.escalated, vec![id.clone()]);
    assert_eq!(manager.get_alert(&id).unwrap().status, AlertStatus::Active);

    tokio::time::advance(Duration::from_secs(60)).await;
    manager.evaluate(&success(40.0)).await;
    let alert = manager.get_alert(&id).unwrap();
    assert_eq!(alert.status, AlertStatus::Escalated);
    assert_eq!(alert.escalation_count, 2);
    assert_eq!(escalations.load(Ordering::SeqCst), 1);

    assert!(matches!(
        manager.acknowledge(&id, "oncall"),
        Err(AlertError::InvalidTransition { from: AlertStatus::Escalated, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_escalated_alert_waits_for_explicit_resolve() {
    let rule = success_rate_rule().with_cooldown(3600).with_escalation(1, 60);
    let (manager, sink) = manager_with(rule);
    let id = manager.evaluate(&success(40.0)).await.created[0].clone();

    tokio::time::advance(Duration::from_secs(60)).await;
    manager.evaluate(&success(40.0)).await;
    assert_eq!(manager.get_alert(&id).unwrap().status, AlertStatus::Escalated);

    for _ in 0..3 {
        let report = manager.evaluate(&success(98.0)).await;
        assert!(report.resolved.is_empty());
    }
    let active = manager.get_active_alerts(None);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
    assert_eq!(active[0].status, AlertStatus::Escalated);
    assert_eq!(sink.len(), 1);

    manager.resolve(&id, "oncall").await.unwrap();
    let alert = manager.get_alert(&id).unwrap();
    assert_eq!(alert.status, AlertStatus::Resolved);
    assert_eq!(alert.resolved_by.as_deref(), Some("oncall"));
    assert!(manager.get_active_alerts(None).is_empty());
}

#[tokio::test]
async fn test_acknowledged_alert_still_auto_resolves() {
    let (manager, _) = manager_with(success_rate_rule());
    let id = manager.evaluate(&success(70.0)).await.created[0].clone();

    manager.acknowledge(&id, "oncall").unwrap();
    let alert = manager.get_alert(&id).unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("oncall"));
    assert!(manager.escalate(&id).is_err());

    let report = manager.evaluate(&success(99.0)).await;
    assert_eq!(report.resolved, vec![id]);
}

#[tokio::test]
async fn test_manual_alert_and_history() {
    let (manager, sink) = manager_with(success_rate_rule());

    let manual = manager.trigger_manual_alert("maintenance", "api-football maintenance window", Severity::Info).await;
    assert_eq!(manual.metric, AlertMetric::Manual);
    assert_eq!(sink.titles().len(), 1);
    assert!(manager.get_rule("maintenance").is_none());

    manager.resolve(&manual.id, "oncall").await.unwrap();
    assert!(matches!(manager.resolve(&manual.id, "oncall").await, Err(AlertError::InvalidTransition { .. })));
    assert!(matches!(manager.resolve("missing", "oncall").await, Err(AlertError::NotFound(_))));

    let stats = manager.get_alert_stats();
    assert_eq!(stats.total_alerts, 1);
    assert_eq!(stats.rules_count, 1);
    assert_eq!(manager.get_alert_history(24).len(), 1);
}

#[tokio::test]
async fn test_disabled_rule_is_skipped() {
    let (manager, _) = manager_with(success_rate_rule());
    assert_eq!(manager.toggle_rule("low_success_rate"), Some(false));

    assert_eq!(manager.evaluate(&success(10.0)).await.created.len(), 0);
    assert_eq!(manager.toggle_rule("unknown"), None);
}
