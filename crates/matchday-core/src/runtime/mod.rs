//! Runtime initialization and lifecycle management.
//!
//! Wires the cache, provider selector, metrics collector and alert manager together from
//! an [`AppConfig`](crate::config::AppConfig), runs their background tasks and
//! coordinates graceful shutdown through one broadcast channel.
//!
//! # Background tasks
//!
//! | Task | Interval setting |
//! |------|------------------|
//! | Cache expiry sweep | `cache.cleanup_interval_seconds` |
//! | Provider health checker | `health_check.interval_seconds` |
//! | Threshold monitor | `metrics.evaluation_interval_seconds` |
//! | Alert evaluator | `alerts.evaluation_interval_seconds` |
//!
//! # Example
//!
//! ```no_run
//! use matchday_core::{config::AppConfig, runtime::MatchdayRuntime};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let mut runtime = MatchdayRuntime::builder().with_config(config).build()?;
//!     runtime.start();
//!
//!     let gateway = runtime.gateway();
//!     // ... fetch through the gateway ...
//!
//!     runtime.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod components;
pub mod lifecycle;

pub use builder::{MatchdayRuntimeBuilder, RuntimeError};
pub use components::MatchdayComponents;
pub use lifecycle::MatchdayRuntime;
