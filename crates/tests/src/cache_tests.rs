//! Response cache behavior through its public API.

use matchday_core::cache::{CacheConfig, EntryOptions, ResponseCache};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tokio::sync::broadcast;

fn cache_with(max_size: usize) -> ResponseCache {
    ResponseCache::new(CacheConfig { max_size, ..CacheConfig::default() })
        .expect("valid cache config")
}

#[tokio::test(start_paused = true)]
async fn test_league_entry_expires_after_ttl() {
    let cache = cache_with(100);
    let leagues = json!({"country": "br", "leagues": ["Serie A", "Serie B"]});
    cache.set("ligas:br", leagues.clone(), EntryOptions::with_ttl(Duration::from_secs(5)));

    assert_eq!(cache.get("ligas:br"), Some(leagues));

    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(cache.get("ligas:br"), None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.size, 0);
    assert!((stats.hit_rate - 50.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_tag_invalidation_leaves_other_tags() {
    let cache = cache_with(100);
    cache.set("jogos:hoje", json!([1, 2]), EntryOptions::default().tag("jogos").tag("ao-vivo"));
    cache.set("jogos:amanha", json!([3]), EntryOptions::default().tag("jogos"));
    cache.set("ligas:br", json!(["Serie A"]), EntryOptions::default().tag("ligas"));

    assert_eq!(cache.get_by_tag("jogos").len(), 2);
    assert_eq!(cache.invalidate_tag("jogos"), 2);

    assert!(cache.get("jogos:hoje").is_none());
    assert!(cache.get_by_tag("ao-vivo").is_empty());
    assert_eq!(cache.get_by_tag("ligas"), vec![("ligas:br".to_string(), json!(["Serie A"]))]);
}

#[tokio::test]
async fn test_capacity_evicts_least_recently_used() {
    let cache = cache_with(2);
    cache.set("a", json!(1), EntryOptions::default());
    cache.set("b", json!(2), EntryOptions::default());
    assert!(cache.get("a").is_some());

    cache.set("c", json!(3), EntryOptions::default());

    assert_eq!(cache.len(), 2);
    assert!(cache.get("b").is_none());
    assert!(cache.get("a").is_some());
    assert!(cache.get("c").is_some());
    assert_eq!(cache.stats().evictions, 1);
}

#[tokio::test]
async fn test_priority_lookup_and_large_values() {
    let cache = cache_with(100);
    let standings: Vec<_> =
        (1..=60).map(|pos| json!({"position": pos, "team": format!("time-{pos}"), "points": 100 - pos})).collect();
    let standings = json!(standings);
    cache.set("tabela:br", standings.clone(), EntryOptions::default().priority(3));
    cache.set("ligas:br", json!(["Serie A"]), EntryOptions::default());

    let high = cache.get_by_priority(3);
    assert_eq!(high, vec![("tabela:br".to_string(), standings)]);
    assert_eq!(cache.stats().compressed_entries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_background_sweep_reaps_without_traffic() {
    let cache = Arc::new(
        ResponseCache::new(CacheConfig { cleanup_interval_seconds: 10, ..CacheConfig::default() })
            .expect("valid cache config"),
    );
    cache.set("ao-vivo", json!({"score": "1-0"}), EntryOptions::with_ttl(Duration::from_secs(5)));
    cache.set("ligas:br", json!(["Serie A"]), EntryOptions::default());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = cache.start_expiry_sweep(shutdown_rx);
    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(cache.len(), 1);
    let stats = cache.stats();
    assert_eq!(stats.expired, 1);
    assert_eq!(stats.total_requests, 0);

    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();
}
