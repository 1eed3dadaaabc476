//! Background expiry sweep for the response cache.
//!
//! The sweep runs on a fixed interval, independent of traffic, until a shutdown signal
//! arrives on the broadcast channel.

use super::ResponseCache;
use std::sync::Arc;
use tokio::{
    sync::broadcast,
    task::JoinHandle,
    time::{Duration, MissedTickBehavior},
};
use tracing::{debug, info};

/// Periodically removes expired entries from `cache`.
///
/// # Arguments
/// * `cache` - Cache to sweep
/// * `interval` - Time between sweeps
/// * `shutdown_rx` - Broadcast receiver for the shutdown signal
pub async fn run_expiry_sweep(
    cache: Arc<ResponseCache>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick completes immediately; nothing can have expired yet.
    ticker.tick().await;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.recv() => {
                debug!("cache expiry sweep received shutdown signal");
                break;
            }

            _ = ticker.tick() => {
                let removed = cache.cleanup_expired();
                debug!(removed, "cache expiry sweep completed");
            }
        }
    }

    info!("cache expiry sweep shutdown complete");
}

impl ResponseCache {
    /// Spawns [`run_expiry_sweep`] on the configured cleanup interval.
    #[must_use]
    pub fn start_expiry_sweep(self: &Arc<Self>, shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        let interval = self.config().cleanup_interval();
        info!(interval_seconds = interval.as_secs(), "starting cache expiry sweep");
        tokio::spawn(run_expiry_sweep(Arc::clone(self), interval, shutdown_rx))
    }
}
