//! Provider selection and fallback across several scripted providers.

use crate::mock_providers::ScriptedProviders;
use matchday_core::{
    metrics::MetricsCollector,
    provider::{
        FallbackOutcome, HealthChecker, ProviderConfig, ProviderError, ProviderSelector,
        ProviderStatus, SelectorConfig, SelectorError,
    },
    types::FailureKind,
};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;

fn three_providers() -> ProviderSelector {
    let selector = ProviderSelector::new(SelectorConfig::default());
    selector.register(&ProviderConfig::new("api-football", 1).with_max_failures(2)).unwrap();
    selector.register(&ProviderConfig::new("sofascore", 2)).unwrap();
    selector.register(&ProviderConfig::new("football-data", 3)).unwrap();
    selector
}

#[tokio::test]
async fn test_failing_provider_is_skipped() {
    let selector = three_providers();
    assert_eq!(selector.best_provider("ligas").as_deref(), Some("api-football"));

    selector.record_failure("api-football", FailureKind::Timeout);
    assert_eq!(selector.status("api-football"), Some(ProviderStatus::Active));
    selector.record_failure("api-football", FailureKind::Timeout);
    assert_eq!(selector.status("api-football"), Some(ProviderStatus::Failing));

    assert_eq!(selector.best_provider("ligas").as_deref(), Some("sofascore"));
    assert_eq!(selector.ranked_providers(), vec!["sofascore", "football-data"]);
}

#[tokio::test(start_paused = true)]
async fn test_fallback_reaches_next_provider() {
    let selector = three_providers();
    let providers = ScriptedProviders::new();
    providers.fail("api-football", 1);

    let outcome = selector.execute_with_fallback("ligas", providers.operation()).await.unwrap();

    let FallbackOutcome::Success { provider, attempts, .. } = outcome else {
        panic!("expected a successful fallback");
    };
    assert_eq!(provider, "sofascore");
    assert_eq!(attempts, 2);
    assert_eq!(providers.calls(), vec!["api-football", "sofascore"]);

    let report = selector.status_report();
    assert_eq!(report.total_failures, 1);
    assert_eq!(report.active, 3);
}

#[tokio::test(start_paused = true)]
async fn test_exhaustion_backs_off_between_attempts() {
    let selector = three_providers();
    let providers = ScriptedProviders::new();
    for name in ["api-football", "sofascore", "football-data"] {
        providers.fail(name, 1);
    }

    let started = Instant::now();
    let outcome = selector.execute_with_fallback("jogos", providers.operation()).await.unwrap();

    assert_eq!(outcome.provider_used(), "all_failed");
    let FallbackOutcome::Exhausted { errors } = outcome else {
        panic!("expected exhaustion");
    };
    assert_eq!(errors.len(), 3);
    assert_eq!(errors[0].provider, "api-football");
    assert_eq!(started.elapsed(), Duration::from_secs(2 + 4));
}

#[tokio::test]
async fn test_none_available_and_unregistered() {
    let empty = ProviderSelector::default();
    let providers = ScriptedProviders::new();
    assert_eq!(
        empty.execute_with_fallback("ligas", providers.operation()).await.unwrap_err(),
        SelectorError::NoProvidersRegistered
    );

    let selector = ProviderSelector::default();
    selector.register(&ProviderConfig::new("api-football", 1)).unwrap();
    selector.disable("api-football").unwrap();

    let outcome = selector.execute_with_fallback("ligas", providers.operation()).await.unwrap();
    assert_eq!(outcome.provider_used(), "none");
    assert!(providers.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_hint_and_reactivation() {
    let selector = Arc::new(three_providers());
    let providers = ScriptedProviders::new();
    providers.push(
        "api-football",
        Err(ProviderError::RateLimited { retry_after: Some(Duration::from_secs(90)) }),
    );

    let outcome = selector.execute_with_fallback("ligas", providers.operation()).await.unwrap();
    assert_eq!(outcome.provider_used(), "sofascore");
    assert_eq!(selector.status("api-football"), Some(ProviderStatus::RateLimited));

    let checker = HealthChecker::new(Arc::clone(&selector), Duration::from_secs(60));
    tokio::time::advance(Duration::from_secs(60)).await;
    assert!(checker.check_once().is_empty());

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(checker.check_once(), vec!["api-football"]);
    assert_eq!(selector.status("api-football"), Some(ProviderStatus::Active));
}

#[tokio::test(start_paused = true)]
async fn test_attempts_feed_metrics() {
    let metrics = Arc::new(MetricsCollector::default());
    let selector = ProviderSelector::default().with_metrics(Arc::clone(&metrics));
    selector.register(&ProviderConfig::new("api-football", 1)).unwrap();
    selector.register(&ProviderConfig::new("sofascore", 2)).unwrap();

    let providers = ScriptedProviders::new();
    providers.push("api-football", Err(ProviderError::Timeout));
    selector.execute_with_fallback("ligas", providers.operation()).await.unwrap();

    let failed = metrics.provider_stats("api-football").unwrap();
    assert_eq!(failed.failed_requests, 1);
    assert_eq!(failed.error_counts.get(&FailureKind::Timeout), Some(&1));
    let served = metrics.provider_stats("sofascore").unwrap();
    assert_eq!(served.successful_requests, 1);
    assert!((served.success_rate - 100.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_attempt_is_counted_as_failure() {
    let metrics = Arc::new(MetricsCollector::default());
    let selector = ProviderSelector::default().with_metrics(Arc::clone(&metrics));
    selector.register(&ProviderConfig::new("api-football", 1)).unwrap();

    let hung = tokio::time::timeout(
        Duration::from_secs(5),
        selector.execute_with_fallback("ligas", |_| std::future::pending::<Result<u32, ProviderError>>()),
    )
    .await;
    assert!(hung.is_err());

    let stats = metrics.provider_stats("api-football").unwrap();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.failed_requests, 1);
    assert_eq!(stats.in_flight, 0);
    assert_eq!(stats.error_counts.get(&FailureKind::Other), Some(&1));
}
