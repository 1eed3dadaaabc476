//! Runtime builder validation, background tasks and shutdown coordination.
//!
//! Tests use `tokio::time::timeout` so a task that ignores shutdown fails instead of
//! hanging the suite.

use crate::mock_providers::{RecordingSink, ScriptedProviders};
use matchday_core::{
    cache::EntryOptions,
    config::AppConfig,
    provider::{ProviderConfig, ProviderStatus},
    runtime::{MatchdayRuntime, MatchdayRuntimeBuilder, RuntimeError},
    types::{FailureKind, Severity},
};
use serde_json::Value;
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};
use tokio::time::{timeout, Duration};

fn create_test_runtime_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.providers.providers = vec![
        ProviderConfig::new("api-football", 1).with_retry_after(30).with_max_failures(1),
        ProviderConfig::new("sofascore", 2),
    ];
    config.health_check.interval_seconds = 5;
    config
}

#[tokio::test]
async fn test_builder_rejects_invalid_configs() {
    assert!(matches!(MatchdayRuntimeBuilder::new().build(), Err(RuntimeError::ConfigValidation(_))));
    assert!(matches!(
        MatchdayRuntime::builder().with_config(AppConfig::default()).build(),
        Err(RuntimeError::NoProviders)
    ));

    let mut config = create_test_runtime_config();
    config.providers.providers.push(ProviderConfig::new("sofascore", 3));
    assert!(matches!(
        MatchdayRuntime::builder().with_config(config).build(),
        Err(RuntimeError::ConfigValidation(_))
    ));
}

#[tokio::test]
async fn test_shutdown_signal_reaches_all_receivers() {
    let mut runtime = MatchdayRuntime::builder()
        .with_config(create_test_runtime_config())
        .build()
        .expect("Failed to build runtime");
    runtime.start();
    assert_eq!(runtime.task_count(), 4);

    let received = Arc::new(AtomicUsize::new(0));
    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let mut rx = runtime.shutdown_receiver();
            let received = Arc::clone(&received);
            tokio::spawn(async move {
                if rx.recv().await.is_ok() {
                    received.fetch_add(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    timeout(Duration::from_secs(5), runtime.shutdown()).await.expect("shutdown should complete");

    for task in tasks {
        timeout(Duration::from_secs(2), task)
            .await
            .expect("task should complete")
            .expect("task should not panic");
    }
    assert_eq!(received.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_health_checker_reactivates_in_background() {
    let mut runtime = MatchdayRuntime::builder()
        .with_config(create_test_runtime_config())
        .disable_alert_evaluator()
        .disable_threshold_monitor()
        .build()
        .expect("Failed to build runtime");
    runtime.start();

    runtime.selector().record_failure("api-football", FailureKind::Connection);
    assert_eq!(runtime.selector().status("api-football"), Some(ProviderStatus::Failing));

    tokio::time::sleep(Duration::from_secs(36)).await;
    assert_eq!(runtime.selector().status("api-football"), Some(ProviderStatus::Active));

    runtime.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_alert_evaluator_uses_configured_rules() {
    let sink = RecordingSink::new();
    let mut runtime = MatchdayRuntime::builder()
        .with_config(create_test_runtime_config())
        .with_notification_sink(sink.clone())
        .build()
        .expect("Failed to build runtime");
    runtime.start();

    let providers = ScriptedProviders::new();
    providers.fail("api-football", 1);
    providers.fail("sofascore", 1);
    let gateway = runtime.gateway();
    gateway.fetch("ligas:br", EntryOptions::default(), providers.operation()).await.unwrap();

    tokio::time::sleep(Duration::from_secs(31)).await;

    let active = runtime.alert_manager().get_active_alerts(Some(Severity::Critical));
    let rules: Vec<_> = active.iter().map(|a| a.rule_name.as_str()).collect();
    assert!(rules.contains(&"critical_success_rate"));
    assert!(rules.contains(&"critical_error_rate"));
    assert!(sink.len() >= 2);

    runtime.shutdown().await;
}

#[tokio::test]
async fn test_snapshot_reflects_runtime_state() {
    let runtime = MatchdayRuntime::builder()
        .with_config(create_test_runtime_config())
        .build()
        .expect("Failed to build runtime");

    let providers = ScriptedProviders::new();
    runtime
        .gateway()
        .fetch("ligas:br", EntryOptions::default().tag("ligas"), providers.operation())
        .await
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    runtime.snapshot().write_json(&path).unwrap();

    let snapshot: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(snapshot["cache"]["stats"]["size"], 1);
    assert_eq!(snapshot["providers"]["total_providers"], 2);
    assert_eq!(snapshot["metrics"]["total_requests"], 1);

    runtime.shutdown().await;
}
