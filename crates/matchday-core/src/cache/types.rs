//! Entry, option and statistics types for the response cache.

use super::compression::Payload;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{collections::BTreeMap, time::Duration};
use tokio::time::Instant;

/// Default priority assigned to entries stored without an explicit one.
pub const DEFAULT_PRIORITY: u8 = 1;

/// Per-call storage options for [`ResponseCache::set`](super::ResponseCache::set).
#[derive(Debug, Clone)]
pub struct EntryOptions {
    /// TTL for this entry; the configured default applies when `None`.
    pub ttl: Option<Duration>,
    pub tags: Vec<String>,
    pub priority: u8,
}

impl Default for EntryOptions {
    fn default() -> Self {
        Self { ttl: None, tags: Vec::new(), priority: DEFAULT_PRIORITY }
    }
}

impl EntryOptions {
    #[must_use]
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl: Some(ttl), ..Self::default() }
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }
}

/// A stored value with its expiry and access bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub payload: Payload,
    pub created_at: Instant,
    pub created_wall: DateTime<Utc>,
    pub ttl: Duration,
    pub access_count: u64,
    pub last_access: Instant,
    pub original_size: usize,
    pub compressed_size: Option<usize>,
    pub tags: Vec<String>,
    pub priority: u8,
}

impl CacheEntry {
    /// An entry is visible only while `now < created_at + ttl`.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.created_at + self.ttl
    }

    /// Bytes held by the stored form.
    pub fn stored_size(&self) -> usize {
        self.compressed_size.unwrap_or(self.original_size)
    }

    pub fn info(&self, key: &str, now: Instant) -> EntryInfo {
        let age = now.saturating_duration_since(self.created_at);
        EntryInfo {
            key: key.to_string(),
            created_at: self.created_wall,
            ttl_seconds: self.ttl.as_secs(),
            age_seconds: age.as_secs_f64(),
            remaining_ttl_seconds: self.ttl.saturating_sub(age).as_secs_f64(),
            access_count: self.access_count,
            seconds_since_access: now.saturating_duration_since(self.last_access).as_secs_f64(),
            compressed: self.compressed_size.is_some(),
            original_size: self.original_size,
            compressed_size: self.compressed_size,
            tags: self.tags.clone(),
            priority: self.priority,
        }
    }
}

/// Read-only view of one entry, for inspection and snapshots.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    pub age_seconds: f64,
    pub remaining_ttl_seconds: f64,
    pub access_count: u64,
    pub seconds_since_access: f64,
    pub compressed: bool,
    pub original_size: usize,
    pub compressed_size: Option<usize>,
    pub tags: Vec<String>,
    pub priority: u8,
}

/// Monotonic counters kept under the cache lock.
#[derive(Debug, Default, Clone)]
pub(crate) struct CacheCounters {
    pub total_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub cleanup_count: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// Point-in-time cache statistics, safe to poll frequently.
///
/// Rates are percentages in `0.0..=100.0` and are `0.0` before the first lookup.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
    pub hit_rate: f64,
    pub miss_rate: f64,
    pub total_requests: u64,
    pub expired: u64,
    pub max_size: usize,
    pub compressed_entries: usize,
    pub memory_usage_bytes: usize,
    pub cleanup_count: u64,
    pub last_cleanup: Option<DateTime<Utc>>,
    pub priority_distribution: BTreeMap<u8, usize>,
    /// Up to ten tags with the most live keys, most populated first.
    pub top_tags: Vec<(String, usize)>,
}
