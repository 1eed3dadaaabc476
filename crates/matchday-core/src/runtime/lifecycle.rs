//! Runtime lifecycle: background task ownership and graceful shutdown.

use crate::{
    alerts::AlertManager,
    cache::ResponseCache,
    config::AppConfig,
    gateway::DataGateway,
    metrics::MetricsCollector,
    provider::ProviderSelector,
    snapshot::SystemSnapshot,
};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, error, info, warn};

use super::{
    builder::{BackgroundTasks, MatchdayRuntimeBuilder},
    MatchdayComponents,
};

/// Owns all components and their background tasks.
///
/// `start()` spawns the enabled loops; `shutdown()` broadcasts on the shared channel and
/// waits for every loop to finish.
pub struct MatchdayRuntime {
    components: MatchdayComponents,
    shutdown_tx: broadcast::Sender<()>,
    config: AppConfig,
    enabled: BackgroundTasks,
    tasks: Vec<JoinHandle<()>>,
    started: bool,
    shutdown_initiated: Arc<AtomicBool>,
}

impl MatchdayRuntime {
    #[must_use]
    pub fn builder() -> MatchdayRuntimeBuilder {
        MatchdayRuntimeBuilder::new()
    }

    pub(super) fn new(
        components: MatchdayComponents,
        shutdown_tx: broadcast::Sender<()>,
        config: AppConfig,
        enabled: BackgroundTasks,
    ) -> Self {
        Self {
            components,
            shutdown_tx,
            config,
            enabled,
            tasks: Vec::new(),
            started: false,
            shutdown_initiated: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the enabled background loops. Calling it again is a no-op.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&mut self) {
        if self.started {
            warn!("runtime already started, ignoring duplicate call");
            return;
        }
        self.started = true;

        let components = &self.components;
        if self.enabled.cache_cleanup {
            self.tasks.push(components.cache().start_expiry_sweep(self.shutdown_tx.subscribe()));
        }
        if self.enabled.health_checker {
            self.tasks
                .push(components.health_checker().start_with_shutdown(self.shutdown_tx.subscribe()));
        }
        if self.enabled.threshold_monitor {
            self.tasks.push(
                components.metrics_collector().start_threshold_monitor(self.shutdown_tx.subscribe()),
            );
        }
        if self.enabled.alert_evaluator {
            self.tasks
                .push(Arc::clone(components.alert_evaluator()).start(self.shutdown_tx.subscribe()));
        }
        info!(tasks = self.tasks.len(), "matchday runtime started");
    }

    #[must_use]
    pub fn components(&self) -> &MatchdayComponents {
        &self.components
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &Arc<ResponseCache> {
        self.components.cache()
    }

    #[must_use]
    pub fn selector(&self) -> &Arc<ProviderSelector> {
        self.components.selector()
    }

    #[must_use]
    pub fn metrics_collector(&self) -> &Arc<MetricsCollector> {
        self.components.metrics_collector()
    }

    #[must_use]
    pub fn alert_manager(&self) -> &Arc<AlertManager> {
        self.components.alert_manager()
    }

    #[must_use]
    pub fn gateway(&self) -> DataGateway {
        self.components.gateway()
    }

    #[must_use]
    pub fn snapshot(&self) -> SystemSnapshot {
        self.components.snapshot()
    }

    /// Number of running background tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Subscribes to the shutdown broadcast, for custom background tasks.
    #[must_use]
    pub fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signals every background task and waits for them to stop. Idempotent.
    pub async fn shutdown(mut self) {
        if self
            .shutdown_initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("shutdown already initiated, ignoring duplicate call");
            return;
        }

        info!("initiating matchday runtime shutdown");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!(error = %e, "failed to send shutdown signal (no receivers)");
        }

        for task in self.tasks.drain(..) {
            match task.await {
                Ok(()) => debug!("background task completed"),
                Err(e) if e.is_cancelled() => debug!("background task cancelled"),
                Err(e) => error!(error = %e, "background task failed"),
            }
        }

        info!("matchday runtime shutdown complete");
    }

    /// Waits for a shutdown broadcast from elsewhere, then shuts down.
    pub async fn wait_for_shutdown(self) {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let _ = shutdown_rx.recv().await;
        info!("shutdown signal received, runtime terminating");
        self.shutdown().await;
    }
}

const _: () = {
    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}
    let _ = assert_send::<MatchdayRuntime>;
    let _ = assert_sync::<MatchdayRuntime>;
};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderConfig;
    use std::time::Duration;

    fn create_test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.providers.providers = vec![ProviderConfig::new("api-football", 1)];
        config
    }

    #[tokio::test]
    async fn test_runtime_lifecycle() {
        let mut runtime = MatchdayRuntime::builder()
            .with_config(create_test_config())
            .build()
            .expect("Failed to build runtime");
        assert_eq!(runtime.task_count(), 0);

        runtime.start();
        runtime.start();
        assert_eq!(runtime.task_count(), 4);
        assert!(runtime.cache().is_empty());
        assert_eq!(runtime.selector().ranked_providers(), vec!["api-football".to_string()]);

        tokio::time::timeout(Duration::from_secs(5), runtime.shutdown())
            .await
            .expect("shutdown should join every task");
    }

    #[tokio::test]
    async fn test_runtime_shutdown_flag() {
        let runtime = MatchdayRuntime::builder()
            .with_config(create_test_config())
            .build()
            .expect("Failed to build runtime");

        let shutdown_flag = Arc::clone(&runtime.shutdown_initiated);
        runtime.shutdown().await;
        assert!(shutdown_flag.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_runtime_shutdown_receiver() {
        let mut runtime = MatchdayRuntime::builder()
            .with_config(create_test_config())
            .disable_alert_evaluator()
            .build()
            .expect("Failed to build runtime");
        runtime.start();
        assert_eq!(runtime.task_count(), 3);

        let mut rx = runtime.shutdown_receiver();
        let task = tokio::spawn(async move {
            rx.recv().await.expect("Shutdown signal received");
        });

        runtime.shutdown().await;

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("Task should complete")
            .expect("Task should not panic");
    }
}
