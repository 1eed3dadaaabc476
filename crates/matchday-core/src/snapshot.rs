//! Point-in-time dump of the whole system state as JSON.

use crate::{
    alerts::{Alert, AlertManager, AlertStats},
    cache::{CacheStats, EntryInfo, ResponseCache},
    metrics::{MetricsCollector, MetricsSummary},
    provider::{ProviderSelector, StatusReport},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Hours of alert history included in a snapshot.
const HISTORY_HOURS: u64 = 24;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to serialize snapshot: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write snapshot: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub stats: CacheStats,
    pub entries: Vec<EntryInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertSnapshot {
    pub stats: AlertStats,
    pub active: Vec<Alert>,
    pub history: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cache: CacheSnapshot,
    pub providers: StatusReport,
    pub metrics: MetricsSummary,
    pub alerts: AlertSnapshot,
}

impl SystemSnapshot {
    #[must_use]
    pub fn capture(
        cache: &ResponseCache,
        selector: &ProviderSelector,
        metrics: &MetricsCollector,
        alerts: &AlertManager,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            cache: CacheSnapshot { stats: cache.stats(), entries: cache.entries_info() },
            providers: selector.status_report(),
            metrics: metrics.summary(),
            alerts: AlertSnapshot {
                stats: alerts.get_alert_stats(),
                active: alerts.get_active_alerts(None),
                history: alerts.get_alert_history(HISTORY_HOURS),
            },
        }
    }

    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialize`] if a component cannot be encoded.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the snapshot as pretty JSON, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError`] on serialization or I/O failure.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "system snapshot written");
        Ok(())
    }
}
