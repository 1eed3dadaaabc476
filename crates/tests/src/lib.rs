//! Cross-component tests for matchday.
//!
//! - `cache_tests`: TTL expiry, tag invalidation and eviction through the public cache API
//! - `fallback_tests`: provider ranking, failure thresholds, backoff and rate limits
//! - `alert_tests`: rule evaluation, cooldown, escalation and auto-resolution
//! - `gateway_tests`: cache-first fetching with provider fallback and metrics
//! - `runtime_tests`: builder validation, background tasks and shutdown
//! - `mock_providers`: scripted providers and a recording notification sink
//!
//! ```bash
//! cargo test --package tests
//! ```

#[cfg(test)]
mod mock_providers;

#[cfg(test)]
mod cache_tests;

#[cfg(test)]
mod fallback_tests;

#[cfg(test)]
mod alert_tests;

#[cfg(test)]
mod gateway_tests;

#[cfg(test)]
mod runtime_tests;
