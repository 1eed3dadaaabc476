//! Bounded rolling window of response-time samples.
//!
//! Keeps the most recent `capacity` samples (oldest dropped first). Statistics are
//! computed on demand by sorting the bounded window, and every statistic is `0.0` for an
//! empty window.

use std::collections::VecDeque;

/// Below this many samples the p95 falls back to the mean.
const MIN_SAMPLES_FOR_P95: usize = 20;

/// Fixed-capacity window of response times in seconds.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    /// Creates an empty window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { samples: VecDeque::with_capacity(capacity.min(1024)), capacity }
    }

    /// Records a sample, dropping the oldest one when full.
    pub fn record(&mut self, seconds: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(seconds);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterates over the retained samples, oldest first.
    pub fn samples(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().copied()
    }

    #[must_use]
    pub fn average(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let count = self.samples.len() as f64;
        self.samples.iter().sum::<f64>() / count
    }

    /// Median; the mean of the two middle samples for an even count.
    #[must_use]
    pub fn median(&self) -> f64 {
        let sorted = self.sorted();
        let len = sorted.len();
        match len {
            0 => 0.0,
            _ if len % 2 == 1 => sorted[len / 2],
            _ => (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0,
        }
    }

    /// 95th percentile, `sorted[floor(n * 0.95)]`.
    ///
    /// With fewer than 20 samples the mean is returned instead.
    #[must_use]
    pub fn p95(&self) -> f64 {
        if self.samples.len() < MIN_SAMPLES_FOR_P95 {
            return self.average();
        }
        let sorted = self.sorted();
        let index = sorted.len() * 95 / 100;
        sorted[index.min(sorted.len() - 1)]
    }

    fn sorted(&self) -> Vec<f64> {
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_unstable_by(f64::total_cmp);
        sorted
    }
}
