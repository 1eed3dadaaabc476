use super::types::AlertRule;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Interval of the rule-evaluation loop (default: 30 seconds).
    pub evaluation_interval_seconds: u64,
    /// Resolve open alerts of a rule once its condition stops holding (default: true).
    pub auto_resolve: bool,
    pub rules: Vec<AlertRule>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self { evaluation_interval_seconds: 30, auto_resolve: true, rules: AlertRule::defaults() }
    }
}

impl AlertsConfig {
    #[must_use]
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_seconds)
    }
}
