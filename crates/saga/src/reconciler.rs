//! Periodic sweeps that rescue stuck sagas.

use std::sync::Arc;
use std::time::Duration;

use saga_store::SagaStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::coordinator::SagaCoordinator;

/// Sweep cadence and the stuck cutoff.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Period of the stuck-saga sweep.
    pub stuck_sweep_interval: Duration,
    /// Period of the failed-saga retry sweep.
    pub retry_sweep_interval: Duration,
    /// How long a processing saga may sit untouched before it counts as
    /// stuck.
    pub stuck_threshold: chrono::Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            stuck_sweep_interval: Duration::from_millis(900_000),
            retry_sweep_interval: Duration::from_millis(300_000),
            stuck_threshold: chrono::Duration::minutes(30),
        }
    }
}

/// Runs the stuck-sweep and retry-sweep timers.
///
/// Both sweeps run in one task, so a sweep can never overlap itself or the
/// other sweep; a tick that fires while a sweep is running is delayed, not
/// stacked.
pub struct Reconciler<S: SagaStore> {
    coordinator: Arc<SagaCoordinator<S>>,
    settings: ReconcilerSettings,
}

impl<S: SagaStore + 'static> Reconciler<S> {
    /// Creates a reconciler over the coordinator.
    pub fn new(coordinator: Arc<SagaCoordinator<S>>, settings: ReconcilerSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    /// Spawns the sweep loop; it runs until the shutdown signal flips.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut stuck_tick = tokio::time::interval(self.settings.stuck_sweep_interval);
            let mut retry_tick = tokio::time::interval(self.settings.retry_sweep_interval);
            stuck_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            retry_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            // Both intervals fire immediately on the first tick; consume
            // those so the service does not sweep during startup.
            stuck_tick.tick().await;
            retry_tick.tick().await;

            tracing::info!(
                stuck_interval_ms = self.settings.stuck_sweep_interval.as_millis() as u64,
                retry_interval_ms = self.settings.retry_sweep_interval.as_millis() as u64,
                "reconciler started"
            );

            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = stuck_tick.tick() => self.run_stuck_sweep().await,
                    _ = retry_tick.tick() => self.run_retry_sweep().await,
                }
            }

            tracing::info!("reconciler stopped");
        })
    }

    /// One stuck sweep; errors are logged, never fatal to the loop.
    async fn run_stuck_sweep(&self) {
        tracing::info!("starting stuck-saga sweep");

        match self
            .coordinator
            .process_stuck_sagas(self.settings.stuck_threshold)
            .await
        {
            Ok(report) => {
                if report.examined > 0 {
                    tracing::info!(
                        examined = report.examined,
                        retried = report.retried,
                        failed = report.failed,
                        errors = report.errors,
                        "stuck-saga sweep finished"
                    );
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "stuck-saga sweep failed");
                metrics::counter!("reconciler_sweep_errors_total").increment(1);
            }
        }

        if let Err(e) = self.coordinator.refresh_status_gauges().await {
            tracing::warn!(error = %e, "failed to refresh status gauges");
        }
    }

    async fn run_retry_sweep(&self) {
        tracing::debug!("starting retry sweep");
        if let Err(e) = self.coordinator.retry_failed_sagas().await {
            tracing::error!(error = %e, "retry sweep failed");
            metrics::counter!("reconciler_sweep_errors_total").increment(1);
        }
    }
}
