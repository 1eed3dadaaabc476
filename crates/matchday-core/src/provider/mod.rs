//! Provider selection, fallback and circuit breaking.
//!
//! [`ProviderSelector`] owns one [`ProviderStatus`] record per registered provider and
//! picks the best eligible one by score (`1000 - priority` plus recency adjustments).
//! [`HealthChecker`] runs the periodic reactivation pass.

pub mod config;
pub mod errors;
pub mod health;
pub mod record;
mod scoring;
pub mod selector;

pub use config::{HealthCheckConfig, ProviderConfig, ProvidersConfig, SelectorConfig};
pub use errors::{ProviderError, SelectorError};
pub use health::HealthChecker;
pub use record::ProviderStatus;
pub use selector::{
    AttemptError, FallbackOutcome, ProviderSelector, ProviderStatusEntry, StatusReport,
    ALL_FAILED, NO_PROVIDER,
};
