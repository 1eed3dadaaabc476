//! Rule-based alerting over provider metrics.
//!
//! ## Components
//!
//! - **[`AlertManager`]**: rules, alert storage and the alert life-cycle
//! - **[`AlertEvaluator`]**: background task feeding current metrics to the manager
//! - **[`NotificationSink`]**: external delivery of alerts and resolutions
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use matchday_core::{
//!     alerts::{AlertManager, AlertMetric, AlertRule, LogNotificationSink, MetricValues},
//!     types::{Comparator, Severity},
//! };
//!
//! # tokio_test_block_on(async {
//! let manager = AlertManager::new(Arc::new(LogNotificationSink));
//! manager
//!     .add_rule(AlertRule::new(
//!         "low_success_rate",
//!         AlertMetric::SuccessRate,
//!         Comparator::LessThan,
//!         80.0,
//!         Severity::Warning,
//!     ))
//!     .unwrap();
//!
//! let report = manager.evaluate(&MetricValues::default().with_success_rate(70.0)).await;
//! assert_eq!(report.created.len(), 1);
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

pub mod config;
pub mod evaluator;
pub mod manager;
pub mod notification;
pub mod types;

pub use config::AlertsConfig;
pub use evaluator::AlertEvaluator;
pub use manager::{AlertManager, EscalationCallback, AUTO_RESOLVER};
pub use notification::{LogNotificationSink, Notification, NotificationSink};
pub use types::{
    Alert, AlertError, AlertMetric, AlertRule, AlertStats, AlertStatus, EvaluationReport,
    MetricValues,
};
