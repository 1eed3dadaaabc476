//! Threshold event log with per-(provider, threshold) cooldowns.

use super::types::{MetricKind, Threshold, ThresholdEvent};
use crate::types::Comparator;
use std::{
    collections::{HashMap, VecDeque},
    time::Duration,
};
use tokio::time::Instant;

/// Identity of an equivalent event: same provider, metric, operator and value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ThresholdKey {
    provider: String,
    metric: MetricKind,
    operator: Comparator,
    value_bits: u64,
}

impl ThresholdKey {
    fn new(provider: &str, threshold: &Threshold) -> Self {
        Self {
            provider: provider.to_string(),
            metric: threshold.metric,
            operator: threshold.operator,
            value_bits: threshold.value.to_bits(),
        }
    }
}

/// Bounded, time-pruned log of threshold events.
#[derive(Debug)]
pub(crate) struct EventLog {
    events: VecDeque<ThresholdEvent>,
    last_fired: HashMap<ThresholdKey, Instant>,
    max_events: usize,
    retention: Duration,
}

impl EventLog {
    pub fn new(max_events: usize, retention: Duration) -> Self {
        Self { events: VecDeque::new(), last_fired: HashMap::new(), max_events, retention }
    }

    /// Returns `true` and starts a new cooldown if `threshold` may fire for `provider`.
    pub fn try_fire(&mut self, provider: &str, threshold: &Threshold, now: Instant) -> bool {
        let key = ThresholdKey::new(provider, threshold);
        if let Some(last) = self.last_fired.get(&key) {
            if now.saturating_duration_since(*last) < threshold.cooldown() {
                return false;
            }
        }
        self.last_fired.insert(key, now);
        true
    }

    pub fn push(&mut self, event: ThresholdEvent) {
        while self.events.len() >= self.max_events {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Drops events older than the retention window.
    pub fn prune(&mut self, now: Instant) {
        let retention = self.retention;
        self.events.retain(|e| now.saturating_duration_since(e.raised_at) <= retention);
        self.last_fired.retain(|_, fired| now.saturating_duration_since(*fired) <= retention);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ThresholdEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
