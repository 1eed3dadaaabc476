//! TTL- and capacity-bounded response cache.
//!
//! The cache is the first point of contact for every logical data request. It stores
//! JSON values keyed by a caller-chosen string (e.g. `"ligas:br"`), each with its own
//! TTL, optional tags and a small priority.
//!
//! # Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                     ResponseCache                        │
//! │  Mutex<CacheInner>                                       │
//! │   ├─ entries: LruCache<key, CacheEntry>  (recency order) │
//! │   ├─ tag_index: tag → {keys}                             │
//! │   ├─ priority_index: priority → {keys}                   │
//! │   └─ counters: hits / misses / evictions / expired       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! All mutation happens under a single lock and never across an await point, so every
//! operation is atomic with respect to concurrent callers.
//!
//! # Expiry
//!
//! An entry is visible only while `now < created + ttl`. An expired entry found by
//! [`ResponseCache::get`] is removed on the spot and counted as an eviction and a miss.
//! The background sweep ([`background::run_expiry_sweep`]) reaps the rest.
//!
//! # Compression
//!
//! Values whose JSON form exceeds `compression_threshold_bytes` are gzip-compressed when
//! that saves at least 20%. Compression is invisible to callers, and failures degrade to
//! raw storage.

pub mod background;
pub mod compression;
pub mod config;
pub mod types;

pub use config::{CacheConfig, CacheError};
pub use types::{CacheStats, EntryInfo, EntryOptions, DEFAULT_PRIORITY};

use chrono::Utc;
use compression::Payload;
use lru::LruCache;
use metrics::counter;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::time::Instant;
use tracing::{debug, error, info, trace};
use types::{CacheCounters, CacheEntry};

/// Maximum number of tags reported in [`CacheStats::top_tags`].
const TOP_TAGS: usize = 10;

struct CacheInner {
    entries: LruCache<String, CacheEntry>,
    tag_index: HashMap<String, HashSet<String>>,
    priority_index: BTreeMap<u8, HashSet<String>>,
    counters: CacheCounters,
    memory_bytes: usize,
}

impl CacheInner {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            tag_index: HashMap::new(),
            priority_index: BTreeMap::new(),
            counters: CacheCounters::default(),
            memory_bytes: 0,
        }
    }

    fn insert(&mut self, key: String, entry: CacheEntry) {
        for tag in &entry.tags {
            self.tag_index.entry(tag.clone()).or_default().insert(key.clone());
        }
        self.priority_index.entry(entry.priority).or_default().insert(key.clone());
        self.memory_bytes += entry.stored_size();
        self.entries.put(key, entry);
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.pop(key)?;
        self.unindex(key, &entry);
        Some(entry)
    }

    fn unindex(&mut self, key: &str, entry: &CacheEntry) {
        for tag in &entry.tags {
            if let Some(keys) = self.tag_index.get_mut(tag) {
                keys.remove(key);
                if keys.is_empty() {
                    self.tag_index.remove(tag);
                }
            }
        }
        if let Some(keys) = self.priority_index.get_mut(&entry.priority) {
            keys.remove(key);
            if keys.is_empty() {
                self.priority_index.remove(&entry.priority);
            }
        }
        self.memory_bytes = self.memory_bytes.saturating_sub(entry.stored_size());
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (key, entry) = self.entries.pop_lru()?;
        self.unindex(&key, &entry);
        self.counters.evictions += 1;
        Some(key)
    }

    fn expired_keys(&self, now: Instant) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// In-memory response cache with LRU eviction, per-entry TTL and side indexes.
pub struct ResponseCache {
    inner: Mutex<CacheInner>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Creates an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if the configuration is unusable.
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        config.validate()?;
        Ok(Self { inner: Mutex::new(CacheInner::new()), config })
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Looks up `key`.
    ///
    /// A live entry counts a hit, bumps its access metadata and becomes most recently
    /// used. An expired entry is removed and counts an eviction plus a miss. A missing
    /// key counts a miss only.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.counters.total_requests += 1;

        let expired = match inner.entries.peek(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                inner.counters.misses += 1;
                counter!("matchday_cache_misses_total").increment(1);
                trace!(key = %key, "cache miss");
                return None;
            }
        };

        if expired {
            inner.remove(key);
            inner.counters.expired += 1;
            inner.counters.evictions += 1;
            inner.counters.misses += 1;
            counter!("matchday_cache_misses_total").increment(1);
            counter!("matchday_cache_evictions_total", "reason" => "expired").increment(1);
            trace!(key = %key, "cache entry expired");
            return None;
        }

        let entry = inner.entries.get_mut(key)?;
        entry.access_count += 1;
        entry.last_access = now;
        let access_count = entry.access_count;
        let payload = entry.payload.clone();

        match compression::decode(payload) {
            Ok(value) => {
                inner.counters.hits += 1;
                counter!("matchday_cache_hits_total").increment(1);
                trace!(key = %key, access_count, "cache hit");
                Some(value)
            }
            Err(e) => {
                error!(key = %key, error = %e, "failed to restore cached value, dropping entry");
                inner.remove(key);
                inner.counters.misses += 1;
                counter!("matchday_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// When the cache is full the least recently used entries are evicted first.
    pub fn set(&self, key: impl Into<String>, value: Value, options: EntryOptions) {
        let key = key.into();
        let ttl = options.ttl.unwrap_or_else(|| self.config.default_ttl());
        let encoded = compression::encode(
            value,
            self.config.compression_threshold_bytes,
            self.config.enable_compression,
        );

        let mut tags = options.tags;
        tags.sort();
        tags.dedup();

        let now = Instant::now();
        let entry = CacheEntry {
            payload: encoded.payload,
            created_at: now,
            created_wall: Utc::now(),
            ttl,
            access_count: 0,
            last_access: now,
            original_size: encoded.original_size,
            compressed_size: encoded.compressed_size,
            tags,
            priority: options.priority,
        };

        let mut inner = self.inner.lock();
        inner.remove(&key);
        while inner.entries.len() >= self.config.max_size {
            match inner.evict_lru() {
                Some(evicted) => {
                    counter!("matchday_cache_evictions_total", "reason" => "capacity").increment(1);
                    debug!(key = %evicted, "evicted least recently used entry");
                }
                None => break,
            }
        }

        trace!(
            key = %key,
            ttl_secs = ttl.as_secs(),
            compressed = entry.compressed_size.is_some(),
            "cache set"
        );
        inner.insert(key, entry);
    }

    /// Removes `key`. Returns `true` if an entry was present.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.lock().remove(key).is_some()
    }

    /// Removes every entry carrying `tag` and returns how many were removed.
    pub fn invalidate_tag(&self, tag: &str) -> usize {
        let mut inner = self.inner.lock();
        let keys: Vec<String> =
            inner.tag_index.get(tag).map(|keys| keys.iter().cloned().collect()).unwrap_or_default();
        let removed = keys.iter().filter(|key| inner.remove(key.as_str()).is_some()).count();
        debug!(tag = %tag, removed, "invalidated tag");
        removed
    }

    /// Removes all entries. Counters are kept.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.tag_index.clear();
        inner.priority_index.clear();
        inner.memory_bytes = 0;
        info!("cache cleared");
    }

    /// Returns all live entries carrying `tag`, sorted by key.
    ///
    /// Each entry is re-validated through [`get`](Self::get), so expired ones are dropped.
    pub fn get_by_tag(&self, tag: &str) -> Vec<(String, Value)> {
        let mut keys: Vec<String> = {
            let inner = self.inner.lock();
            inner.tag_index.get(tag).map(|keys| keys.iter().cloned().collect()).unwrap_or_default()
        };
        keys.sort();
        self.collect_live(keys)
    }

    /// Returns all live entries stored with `priority`, sorted by key.
    pub fn get_by_priority(&self, priority: u8) -> Vec<(String, Value)> {
        let mut keys: Vec<String> = {
            let inner = self.inner.lock();
            inner
                .priority_index
                .get(&priority)
                .map(|keys| keys.iter().cloned().collect())
                .unwrap_or_default()
        };
        keys.sort();
        self.collect_live(keys)
    }

    fn collect_live(&self, keys: Vec<String>) -> Vec<(String, Value)> {
        keys.into_iter().filter_map(|key| self.get(&key).map(|value| (key, value))).collect()
    }

    /// Removes every expired entry and returns how many were removed.
    ///
    /// This is the body of the background sweep.
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let expired = inner.expired_keys(now);
        for key in &expired {
            inner.remove(key);
        }
        inner.counters.expired += expired.len() as u64;
        inner.counters.cleanup_count += 1;
        inner.counters.last_cleanup = Some(Utc::now());

        if !expired.is_empty() {
            info!(removed = expired.len(), remaining = inner.entries.len(), "expired entries swept");
        }
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet reaped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a statistics snapshot.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let counters = &inner.counters;

        #[allow(clippy::cast_precision_loss)]
        let (hit_rate, miss_rate) = if counters.total_requests == 0 {
            (0.0, 0.0)
        } else {
            let total = counters.total_requests as f64;
            (counters.hits as f64 / total * 100.0, counters.misses as f64 / total * 100.0)
        };

        let mut top_tags: Vec<(String, usize)> =
            inner.tag_index.iter().map(|(tag, keys)| (tag.clone(), keys.len())).collect();
        top_tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_tags.truncate(TOP_TAGS);

        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            size: inner.entries.len(),
            hit_rate,
            miss_rate,
            total_requests: counters.total_requests,
            expired: counters.expired,
            max_size: self.config.max_size,
            compressed_entries: inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.compressed_size.is_some())
                .count(),
            memory_usage_bytes: inner.memory_bytes,
            cleanup_count: counters.cleanup_count,
            last_cleanup: counters.last_cleanup,
            priority_distribution: inner
                .priority_index
                .iter()
                .map(|(priority, keys)| (*priority, keys.len()))
                .collect(),
            top_tags,
        }
    }

    /// Describes every stored entry, most recently used first.
    #[must_use]
    pub fn entries_info(&self) -> Vec<EntryInfo> {
        let now = Instant::now();
        let inner = self.inner.lock();
        inner.entries.iter().map(|(key, entry)| entry.info(key, now)).collect()
    }
}
