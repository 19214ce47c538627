//! Process-wide run scheduler
//!
//! A long-lived poll loop that repeatedly asks persistence which runs are
//! active (running or paused), admits them up to a configurable concurrency
//! cap in priority order, and spawns one drive task per admitted run. The
//! in-flight set guarantees a run is never driven by two tasks at once
//! within this process.

use crate::workflow::actions::ActionRegistry;
use crate::workflow::executor::RunDriver;
use crate::workflow::{RunId, WorkflowStorage};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Scheduler tuning knobs
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How many distinct runs may be driven at once
    pub max_concurrent_runs: usize,
    /// Delay between scan cycles
    pub poll_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 5,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// The poll loop driving every active run
pub struct RunScheduler {
    storage: Arc<WorkflowStorage>,
    driver: Arc<RunDriver>,
    config: SchedulerConfig,
    in_flight: Arc<dashmap::DashMap<RunId, ()>>,
}

impl RunScheduler {
    /// Create a scheduler over a storage gateway and action registry
    pub fn new(
        storage: Arc<WorkflowStorage>,
        registry: Arc<ActionRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        let driver = Arc::new(RunDriver::new(storage.clone(), registry));
        Self {
            storage,
            driver,
            config,
            in_flight: Arc::new(dashmap::DashMap::new()),
        }
    }

    /// Number of runs currently being driven
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// One scan cycle: admit active runs into free slots, newest last.
    /// Returns the run IDs admitted this cycle.
    pub fn poll_once(&self) -> crate::Result<Vec<RunId>> {
        let active = self.storage.list_active_runs()?;
        let slots = self
            .config
            .max_concurrent_runs
            .saturating_sub(self.in_flight.len());

        let mut admitted = Vec::new();
        for run in active {
            if admitted.len() >= slots {
                break;
            }
            if self.in_flight.contains_key(&run.id) {
                continue;
            }

            self.in_flight.insert(run.id, ());
            admitted.push(run.id);

            let driver = self.driver.clone();
            let in_flight = self.in_flight.clone();
            let run_id = run.id;
            tokio::spawn(async move {
                if let Err(e) = driver.process_run(&run_id).await {
                    tracing::error!(%run_id, error = %e, "Error processing run");
                }
                in_flight.remove(&run_id);
            });
        }

        if !admitted.is_empty() {
            tracing::debug!(
                admitted = admitted.len(),
                in_flight = self.in_flight.len(),
                cap = self.config.max_concurrent_runs,
                "Admitted runs"
            );
        }

        Ok(admitted)
    }

    /// Run the poll loop until the cancellation token fires
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            cap = self.config.max_concurrent_runs,
            interval = ?self.config.poll_interval,
            "Scheduler started, polling for active runs"
        );

        loop {
            if let Err(e) = self.poll_once() {
                tracing::error!(error = %e, "Scan cycle failed");
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }

        tracing::info!("Scheduler stopped");
    }
}
