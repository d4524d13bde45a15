//! Worker liveness monitoring
//!
//! A worker that stops reporting never declares itself lost; the coordinator
//! infers it. The monitor sweeps the tracker on an interval and marks every
//! started worker whose last report is older than the heartbeat timeout.
//! Both the timeout and the sweep cadence are explicit configuration.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{debug, info};

use crate::status::WorkerTracker;

/// Periodic staleness sweep over a worker tracker
pub struct LivenessMonitor;

impl LivenessMonitor {
    /// Spawns the sweep loop
    ///
    /// # Arguments
    /// * `tracker` - The tracker to sweep
    /// * `heartbeat_timeout` - Reports older than this mark a worker lost
    /// * `check_interval` - How often to sweep
    ///
    /// # Returns
    /// The task handle; abort it to stop monitoring.
    pub fn spawn(
        tracker: Arc<WorkerTracker>,
        heartbeat_timeout: Duration,
        check_interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = time::interval(check_interval);

            loop {
                ticker.tick().await;

                debug!("sweeping for stale workers");
                let marked = tracker.sweep_stale(heartbeat_timeout, Utc::now());

                for worker_id in &marked {
                    info!(%worker_id, "worker lost: no report within timeout");
                }
            }
        })
    }
}
