//! # Matchday Core
//!
//! Resilience core for an aggregator of football data fetched from several third-party
//! providers.
//!
//! - **[`cache`]**: in-memory response cache with TTL, tags, priorities, compression of
//!   large values and LRU eviction.
//!
//! - **[`provider`]**: provider selection by score, automatic fallback with exponential
//!   backoff, failure and rate-limit tracking, and timed reactivation.
//!
//! - **[`metrics`]**: per-provider request outcomes, response-time percentiles and
//!   threshold events.
//!
//! - **[`alerts`]**: rule-based alerts with cooldown, acknowledgement, escalation and
//!   auto-resolution.
//!
//! - **[`gateway`]**: cache-first fetch through the provider selector.
//!
//! - **[`runtime`]**: wiring from [`config::AppConfig`], background tasks and shutdown.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         DataGateway                          │
//! │  ┌─────────────────┐  ┌──────────────────┐                   │
//! │  │  ResponseCache  │  │ ProviderSelector │──► HealthChecker  │
//! │  └─────────────────┘  └────────┬─────────┘                   │
//! │                                │ attempts                    │
//! │                       ┌────────▼─────────┐                   │
//! │                       │ MetricsCollector │──► thresholds     │
//! │                       └────────┬─────────┘                   │
//! │                                │ summary                     │
//! │                       ┌────────▼─────────┐                   │
//! │                       │  AlertEvaluator  │──► AlertManager   │
//! │                       └──────────────────┘                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Request Flow
//!
//! ```text
//! fetch(key)
//!     │
//!     ▼
//! ┌─────────────┐
//! │ Cache Check │ ─── Hit ──► cached value
//! └──────┬──────┘
//!        │ Miss
//!        ▼
//! ┌──────────────────┐
//! │ ranked providers │ ─── none eligible ──► NoneAvailable
//! └────────┬─────────┘
//!          ▼
//!   attempt provider ─── error ──► record failure, backoff, next provider
//!          │                                        │
//!          │ ok                              all tried ──► Exhausted
//!          ▼
//!   record success, cache value
//! ```

pub mod alerts;
pub mod cache;
pub mod config;
pub mod gateway;
pub mod metrics;
pub mod provider;
pub mod runtime;
pub mod snapshot;
pub mod types;
