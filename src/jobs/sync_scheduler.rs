//! Sync Scheduler Job
//!
//! Wakes on a fixed tick, finds active configurations whose frequency
//! interval has elapsed and starts one run for each. Runs for different
//! configurations proceed concurrently; a configuration already in flight is
//! skipped until its run finishes. Stops when the shutdown channel flips,
//! after awaiting the runs it started.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio::time::{Duration, MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::models::sync::{Frequency, SyncStatus};
use crate::services::error::SyncError;
use crate::services::sync_engine::SyncEngine;
use crate::services::sync_store::SyncStore;

/// Start the scheduler loop.
///
/// The first tick fires immediately, so due configurations are picked up
/// on startup.
pub fn start_sync_scheduler(
    engine: Arc<SyncEngine>,
    store: Arc<dyn SyncStore>,
    tick: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(tick_secs = tick.as_secs(), "Sync scheduler started");

        let mut ticker = interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs = ScheduledRuns::default();

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received, stopping sync scheduler");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    runs.reap_finished();
                    match schedule_due_syncs(&engine, store.as_ref(), Utc::now(), &mut runs).await {
                        Ok(0) => debug!("No syncs due"),
                        Ok(started) => info!(started = started, "Scheduled due syncs"),
                        Err(e) => error!(error = %e, "Failed to load sync configurations"),
                    }
                }
            }
        }

        if !runs.is_empty() {
            info!(in_flight = runs.len(), "Waiting for in-flight syncs to finish");
        }
        runs.wait_all().await;

        info!("Sync scheduler stopped");
    })
}

/// Runs spawned by the scheduler, keyed by task id so an abnormally ended
/// task still releases its configuration.
#[derive(Default)]
pub struct ScheduledRuns {
    tasks: JoinSet<()>,
    sync_ids: HashMap<Id, i32>,
}

impl ScheduledRuns {
    pub fn len(&self) -> usize {
        self.sync_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sync_ids.is_empty()
    }

    /// True while a run spawned for `sync_id` has not been reaped
    pub fn contains(&self, sync_id: i32) -> bool {
        self.sync_ids.values().any(|id| *id == sync_id)
    }

    fn spawn(&mut self, engine: Arc<SyncEngine>, sync_id: i32) {
        let handle = self.tasks.spawn(async move {
            // Failures are already recorded on the configuration and in its log
            if let Err(e) = engine.run_sync(sync_id).await {
                warn!(sync_id = sync_id, error = %e, "Scheduled sync failed");
            }
        });
        self.sync_ids.insert(handle.id(), sync_id);
    }

    /// Forget every run that has finished, without waiting
    pub fn reap_finished(&mut self) -> Vec<i32> {
        let mut finished = Vec::new();
        while let Some(result) = self.tasks.try_join_next_with_id() {
            finished.extend(self.settle(result));
        }
        finished
    }

    /// Wait for every run; returns their sync ids in completion order
    pub async fn wait_all(&mut self) -> Vec<i32> {
        let mut finished = Vec::new();
        while let Some(result) = self.tasks.join_next_with_id().await {
            finished.extend(self.settle(result));
        }
        finished
    }

    fn settle(&mut self, result: Result<(Id, ()), JoinError>) -> Option<i32> {
        let task_id = match &result {
            Ok((id, _)) => *id,
            Err(e) => e.id(),
        };
        let sync_id = self.sync_ids.remove(&task_id);
        if let Err(e) = result {
            warn!(sync_id = ?sync_id, error = %e, "Sync task ended abnormally");
        }
        sync_id
    }
}

/// Spawn a run for every active configuration due at `now`.
///
/// Returns how many runs were started. Configurations with a run in `runs`
/// (or already running on the engine) are skipped.
pub async fn schedule_due_syncs(
    engine: &Arc<SyncEngine>,
    store: &dyn SyncStore,
    now: DateTime<Utc>,
    runs: &mut ScheduledRuns,
) -> Result<usize, SyncError> {
    let mut started = 0;

    for frequency in Frequency::ALL {
        let candidates = store
            .find_by_frequency_and_status(frequency, SyncStatus::Active)
            .await?;

        for sync in candidates {
            let last_sync = sync.last_sync.map(|t| t.with_timezone(&Utc));
            if !frequency.is_due(last_sync, now) {
                continue;
            }
            if runs.contains(sync.id) || engine.is_running(sync.id) {
                debug!(sync_id = sync.id, "Sync still running, skipping");
                continue;
            }

            runs.spawn(Arc::clone(engine), sync.id);
            started += 1;
        }
    }

    Ok(started)
}
