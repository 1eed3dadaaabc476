//! Priority and recency scoring for provider selection.
//!
//! `score = (1000 - priority) + success_bonus - failure_penalty`
//!
//! | Last success | Bonus | Last failure | Penalty |
//! |--------------|-------|--------------|---------|
//! | within 1h    | +100  | within 5min  | -200    |
//! | within 24h   | +50   | within 1h    | -100    |
//!
//! Scores are pure functions of the record and the evaluation instant.

use super::record::ProviderRecord;
use std::{cmp::Ordering, time::Duration};
use tokio::time::Instant;

const BASE_SCORE: i64 = 1000;

const RECENT_SUCCESS: Duration = Duration::from_secs(3600);
const DAILY_SUCCESS: Duration = Duration::from_secs(86_400);
const RECENT_FAILURE: Duration = Duration::from_secs(300);
const HOURLY_FAILURE: Duration = Duration::from_secs(3600);

pub(crate) fn score_at(record: &ProviderRecord, now: Instant) -> i64 {
    let mut score = BASE_SCORE - i64::from(record.priority);

    if let Some(last) = record.last_success {
        let since = now.saturating_duration_since(last);
        if since < RECENT_SUCCESS {
            score += 100;
        } else if since < DAILY_SUCCESS {
            score += 50;
        }
    }

    if let Some(last) = record.last_failure {
        let since = now.saturating_duration_since(last);
        if since < RECENT_FAILURE {
            score -= 200;
        } else if since < HOURLY_FAILURE {
            score -= 100;
        }
    }

    score
}

/// Orders by descending score, then ascending priority, then name.
pub(crate) fn compare(a: (&ProviderRecord, i64), b: (&ProviderRecord, i64)) -> Ordering {
    b.1.cmp(&a.1)
        .then_with(|| a.0.priority.cmp(&b.0.priority))
        .then_with(|| a.0.name.cmp(&b.0.name))
}
