//! Notification sink boundary.
//!
//! The alert manager hands every alert and resolution to a [`NotificationSink`] and logs
//! the per-channel outcome. Delivery is never retried by the manager.

use crate::types::Severity;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    pub metadata: BTreeMap<String, Value>,
}

/// Delivers notifications to one or more channels.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Sends `notification` and returns the delivery outcome per channel name.
    async fn send(&self, notification: &Notification) -> HashMap<String, bool>;
}

/// Writes notifications to the log as its only channel, `"log"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn send(&self, notification: &Notification) -> HashMap<String, bool> {
        match notification.severity {
            Severity::Info => info!(
                title = %notification.title,
                severity = %notification.severity,
                "{}", notification.body
            ),
            Severity::Warning | Severity::Error | Severity::Critical => warn!(
                title = %notification.title,
                severity = %notification.severity,
                "{}", notification.body
            ),
        }
        HashMap::from([("log".to_string(), true)])
    }
}
