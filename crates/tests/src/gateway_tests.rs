//! Cache-first fetching across the cache, selector, metrics and alerts.

use crate::mock_providers::{RecordingSink, ScriptedProviders};
use matchday_core::{
    alerts::{AlertEvaluator, AlertManager, AlertMetric, AlertRule},
    cache::{CacheConfig, EntryOptions, ResponseCache},
    gateway::{DataGateway, FetchResult, FetchSource},
    metrics::{MetricsCollector, MetricsConfig},
    provider::{ProviderConfig, ProviderError, ProviderSelector, ProviderStatus},
    types::{Comparator, FailureKind, Severity},
};
use std::{sync::Arc, time::Duration};

struct Harness {
    cache: Arc<ResponseCache>,
    selector: Arc<ProviderSelector>,
    metrics: Arc<MetricsCollector>,
    gateway: DataGateway,
}

fn harness() -> Harness {
    let cache = Arc::new(ResponseCache::new(CacheConfig::default()).unwrap());
    let metrics = Arc::new(MetricsCollector::new(MetricsConfig { thresholds: Vec::new(), ..MetricsConfig::default() }));
    let selector = Arc::new(ProviderSelector::default().with_metrics(Arc::clone(&metrics)));
    selector.register(&ProviderConfig::new("api-football", 1).with_max_failures(2)).unwrap();
    selector.register(&ProviderConfig::new("sofascore", 2)).unwrap();
    let gateway = DataGateway::new(Arc::clone(&cache), Arc::clone(&selector));
    Harness { cache, selector, metrics, gateway }
}

#[tokio::test(start_paused = true)]
async fn test_fallback_value_is_cached_with_options() {
    let h = harness();
    let providers = ScriptedProviders::new();
    providers.fail("api-football", 1);

    let options = EntryOptions::with_ttl(Duration::from_secs(600)).tag("ligas").priority(2);
    let first = h.gateway.fetch("ligas:br", options.clone(), providers.operation()).await.unwrap();
    let first = first.into_outcome().unwrap();
    assert_eq!(first.source, FetchSource::Provider("sofascore".to_string()));

    let second = h.gateway.fetch("ligas:br", options, providers.operation()).await.unwrap();
    assert_eq!(second.into_outcome().unwrap().source, FetchSource::Cache);
    assert_eq!(providers.calls().len(), 2);

    assert_eq!(h.cache.get_by_tag("ligas").len(), 1);
    assert_eq!(h.cache.get_by_priority(2).len(), 1);
    assert_eq!(h.metrics.summary().total_requests, 2);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_failures_trip_provider() {
    let h = harness();
    let providers = ScriptedProviders::new();
    providers.fail("api-football", 1);

    h.gateway.fetch("jogos:1", EntryOptions::default(), providers.operation()).await.unwrap();
    assert_eq!(h.selector.status("api-football"), Some(ProviderStatus::Active));

    h.selector.record_failure("api-football", FailureKind::Timeout);
    assert_eq!(h.selector.status("api-football"), Some(ProviderStatus::Failing));

    providers.fail("sofascore", 1);
    let result = h.gateway.fetch("jogos:2", EntryOptions::default(), providers.operation()).await.unwrap();
    let FetchResult::Unavailable(outcome) = result else {
        panic!("expected the only eligible provider to fail");
    };
    assert_eq!(outcome.provider_used(), "all_failed");
    assert!(h.cache.get("jogos:2").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_error_rate_alert_follows_provider_outages() {
    let h = harness();
    let sink = RecordingSink::new();
    let manager = Arc::new(AlertManager::new(sink.clone()));
    manager
        .add_rule(AlertRule::new("high_error_rate", AlertMetric::ErrorRate, Comparator::GreaterThan, 20.0, Severity::Warning))
        .unwrap();
    let evaluator = AlertEvaluator::new(Arc::clone(&manager), Arc::clone(&h.metrics), Duration::from_secs(30))
        .with_selector(Arc::clone(&h.selector));

    let providers = ScriptedProviders::new();
    providers.push("api-football", Err(ProviderError::Timeout));
    h.gateway.fetch("ligas:br", EntryOptions::default(), providers.operation()).await.unwrap();

    let report = evaluator.evaluate_once().await;
    assert_eq!(report.created.len(), 1);
    let alert = manager.get_alert(&report.created[0]).unwrap();
    assert!((alert.value - 50.0).abs() < 1e-9);

    for key in ["a", "b", "c", "d", "e", "f"] {
        h.gateway.fetch(key, EntryOptions::default(), providers.operation()).await.unwrap();
    }
    let report = evaluator.evaluate_once().await;
    assert_eq!(report.resolved.len(), 1);
    assert_eq!(sink.len(), 2);
}
