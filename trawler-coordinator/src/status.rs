//! Worker status tracking
//!
//! Maintains one [`WorkerMeta`] record per worker invocation and enforces the
//! lifecycle state machine: `started -> completed` or `started -> lost`, no
//! other transitions. The tracker is the single synchronization point between
//! otherwise independent workers; every mutation goes through one lock, which
//! makes updates mutually exclusive per worker id.
//!
//! Status errors here indicate protocol violations by the caller or the
//! worker, not transient conditions to retry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use trawler_core::domain::worker::{WorkerMeta, WorkerStatus};
use trawler_core::dto::report::WorkerReport;

/// Errors raised by the lifecycle state machine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusError {
    /// A live (non-terminal) record already exists for this worker id
    #[error("worker {0} already has a live record")]
    DuplicateWorker(String),

    /// No record exists for this worker id
    #[error("no record for worker {0}")]
    UnknownWorker(String),

    /// The record is already `completed` or `lost` and is frozen
    #[error("worker {0} is already in a terminal state")]
    AlreadyTerminal(String),

    /// The report's counters violate a record invariant
    #[error("invalid report for worker {0}: {1}")]
    InvalidReport(String, String),
}

/// Summary statistics across all known worker records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSummary {
    pub started: usize,
    pub completed: usize,
    pub lost: usize,
    pub total_items_crawled: u64,
    pub total_items_failed: u64,
    pub total_bytes_uploaded: u64,
}

/// Coordinator-side registry of worker lifecycle records
#[derive(Debug, Default)]
pub struct WorkerTracker {
    workers: Mutex<HashMap<String, WorkerMeta>>,
}

impl WorkerTracker {
    /// Creates an empty tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that a worker began executing
    ///
    /// Creates a fresh record in `started` state. Fails with
    /// [`StatusError::DuplicateWorker`] if a live record already exists for
    /// this id. A terminal record for the same id is superseded: only live
    /// records block re-creation.
    pub fn record_start(
        &self,
        worker_id: &str,
        region: &str,
        ip: &str,
    ) -> Result<(), StatusError> {
        let mut workers = self.workers.lock().unwrap();

        if let Some(existing) = workers.get(worker_id)
            && !existing.is_terminal()
        {
            return Err(StatusError::DuplicateWorker(worker_id.to_string()));
        }

        debug!(worker_id, region, ip, "worker started");
        workers.insert(worker_id.to_string(), WorkerMeta::new(worker_id, region, ip));
        Ok(())
    }

    /// Records a liveness heartbeat from a started worker
    pub fn record_heartbeat(&self, worker_id: &str) -> Result<(), StatusError> {
        let mut workers = self.workers.lock().unwrap();
        let meta = live_record(&mut workers, worker_id)?;
        meta.last_report_at = Utc::now();
        Ok(())
    }

    /// Records that a worker completed, freezing its record
    ///
    /// Stamps the end time and computes average throughput. The throughput is
    /// left unset when no time elapsed between start and completion.
    pub fn record_completion(
        &self,
        worker_id: &str,
        items_crawled: u64,
        items_failed: u64,
        bytes_uploaded: u64,
    ) -> Result<(), StatusError> {
        if items_failed > items_crawled {
            return Err(StatusError::InvalidReport(
                worker_id.to_string(),
                format!(
                    "items_failed ({}) exceeds items_crawled ({})",
                    items_failed, items_crawled
                ),
            ));
        }

        let mut workers = self.workers.lock().unwrap();
        let meta = live_record(&mut workers, worker_id)?;

        let ended = Utc::now();
        let elapsed_secs = (ended - meta.started_at).num_milliseconds() as f64 / 1000.0;

        meta.status = WorkerStatus::Completed;
        meta.ended_at = Some(ended);
        meta.last_report_at = ended;
        meta.num_items_crawled = items_crawled;
        meta.num_items_failed = items_failed;
        meta.bytes_uploaded = bytes_uploaded;
        meta.average_items_per_second = if elapsed_secs > 0.0 {
            Some(items_crawled as f64 / elapsed_secs)
        } else {
            None
        };

        debug!(worker_id, items_crawled, items_failed, "worker completed");
        Ok(())
    }

    /// Marks a started worker as lost, freezing its record
    ///
    /// Called by the liveness check when a worker stops reporting without
    /// reaching completion; workers never declare themselves lost.
    pub fn mark_lost(&self, worker_id: &str) -> Result<(), StatusError> {
        let mut workers = self.workers.lock().unwrap();
        let meta = live_record(&mut workers, worker_id)?;

        meta.status = WorkerStatus::Lost;
        meta.ended_at = Some(Utc::now());
        meta.status_text = Some("stopped reporting before completion".to_string());

        warn!(worker_id, region = %meta.region, "worker marked lost");
        Ok(())
    }

    /// Applies one report event from the heartbeat/report channel
    pub fn apply(&self, report: &WorkerReport) -> Result<(), StatusError> {
        match report {
            WorkerReport::Started {
                worker_id,
                region,
                ip,
            } => self.record_start(worker_id, region, ip),
            WorkerReport::Heartbeat { worker_id } => self.record_heartbeat(worker_id),
            WorkerReport::Completed {
                worker_id,
                num_items_crawled,
                num_items_failed,
                bytes_uploaded,
            } => self.record_completion(
                worker_id,
                *num_items_crawled,
                *num_items_failed,
                *bytes_uploaded,
            ),
        }
    }

    /// Marks every stale started worker as lost
    ///
    /// A worker is stale when its last report is older than `timeout` at
    /// `now`. Returns the ids that were marked, for logging.
    pub fn sweep_stale(&self, timeout: Duration, now: DateTime<Utc>) -> Vec<String> {
        let cutoff = now - chrono::Duration::milliseconds(timeout.as_millis() as i64);
        let mut workers = self.workers.lock().unwrap();

        let mut marked = Vec::new();
        for meta in workers.values_mut() {
            if meta.status == WorkerStatus::Started && meta.last_report_at < cutoff {
                meta.status = WorkerStatus::Lost;
                meta.ended_at = Some(now);
                meta.status_text = Some("no report within heartbeat timeout".to_string());
                marked.push(meta.worker_id.clone());
            }
        }

        if !marked.is_empty() {
            warn!(count = marked.len(), "marked stale worker(s) lost");
        }
        marked
    }

    /// Produces summary statistics across all known records
    ///
    /// Pure read-only projection; safe to call concurrently with mutations.
    pub fn aggregate(&self) -> StatsSummary {
        let workers = self.workers.lock().unwrap();

        let mut summary = StatsSummary::default();
        for meta in workers.values() {
            match meta.status {
                WorkerStatus::Started => summary.started += 1,
                WorkerStatus::Completed => summary.completed += 1,
                WorkerStatus::Lost => summary.lost += 1,
            }
            summary.total_items_crawled += meta.num_items_crawled;
            summary.total_items_failed += meta.num_items_failed;
            summary.total_bytes_uploaded += meta.bytes_uploaded;
        }
        summary
    }

    /// Returns a clone of one worker's record, if known
    pub fn snapshot(&self, worker_id: &str) -> Option<WorkerMeta> {
        self.workers.lock().unwrap().get(worker_id).cloned()
    }
}

/// Looks up a record and rejects terminal ones, which are frozen
fn live_record<'a>(
    workers: &'a mut HashMap<String, WorkerMeta>,
    worker_id: &str,
) -> Result<&'a mut WorkerMeta, StatusError> {
    let meta = workers
        .get_mut(worker_id)
        .ok_or_else(|| StatusError::UnknownWorker(worker_id.to_string()))?;

    if meta.is_terminal() {
        return Err(StatusError::AlreadyTerminal(worker_id.to_string()));
    }

    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_then_complete() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();
        tracker.record_completion("w1", 40, 3, 2048).unwrap();

        let meta = tracker.snapshot("w1").unwrap();
        assert_eq!(meta.status, WorkerStatus::Completed);
        assert_eq!(meta.num_items_crawled, 40);
        assert_eq!(meta.num_items_failed, 3);
        assert_eq!(meta.bytes_uploaded, 2048);
        assert!(meta.ended_at.is_some());
    }

    #[test]
    fn test_duplicate_start_is_rejected_while_live() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();

        let err = tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap_err();
        assert_eq!(err, StatusError::DuplicateWorker("w1".to_string()));
    }

    #[test]
    fn test_terminal_record_can_be_superseded() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();
        tracker.mark_lost("w1").unwrap();

        // Only live records block re-creation
        tracker.record_start("w1", "eu-west-1", "5.6.7.8").unwrap();
        let meta = tracker.snapshot("w1").unwrap();
        assert_eq!(meta.status, WorkerStatus::Started);
        assert_eq!(meta.region, "eu-west-1");
    }

    #[test]
    fn test_completion_without_start_is_unknown() {
        let tracker = WorkerTracker::new();
        let err = tracker.record_completion("ghost", 1, 0, 0).unwrap_err();
        assert_eq!(err, StatusError::UnknownWorker("ghost".to_string()));
    }

    #[test]
    fn test_no_transition_out_of_terminal() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();
        tracker.record_completion("w1", 1, 0, 0).unwrap();

        assert_eq!(
            tracker.record_completion("w1", 2, 0, 0).unwrap_err(),
            StatusError::AlreadyTerminal("w1".to_string())
        );
        assert_eq!(
            tracker.mark_lost("w1").unwrap_err(),
            StatusError::AlreadyTerminal("w1".to_string())
        );
        assert_eq!(
            tracker.record_heartbeat("w1").unwrap_err(),
            StatusError::AlreadyTerminal("w1".to_string())
        );
    }

    #[test]
    fn test_failed_exceeding_crawled_is_rejected() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();

        let err = tracker.record_completion("w1", 3, 5, 0).unwrap_err();
        assert!(matches!(err, StatusError::InvalidReport(_, _)));

        // Record stays live after the rejected report
        let meta = tracker.snapshot("w1").unwrap();
        assert_eq!(meta.status, WorkerStatus::Started);
    }

    #[test]
    fn test_average_throughput_is_plausible() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();

        // Backdate the start so elapsed time is known
        {
            let mut workers = tracker.workers.lock().unwrap();
            let meta = workers.get_mut("w1").unwrap();
            meta.started_at = Utc::now() - chrono::Duration::seconds(10);
        }

        tracker.record_completion("w1", 100, 0, 0).unwrap();
        let meta = tracker.snapshot("w1").unwrap();
        let avg = meta.average_items_per_second.unwrap();
        // 100 items over ~10s
        assert!(avg > 8.0 && avg < 12.0, "avg = {}", avg);
    }

    #[test]
    fn test_sweep_marks_only_stale_started_workers() {
        let tracker = WorkerTracker::new();
        tracker.record_start("stale", "us-west-1", "1.1.1.1").unwrap();
        tracker.record_start("fresh", "us-west-1", "2.2.2.2").unwrap();
        tracker.record_start("done", "us-west-1", "3.3.3.3").unwrap();
        tracker.record_completion("done", 1, 0, 0).unwrap();

        {
            let mut workers = tracker.workers.lock().unwrap();
            workers.get_mut("stale").unwrap().last_report_at =
                Utc::now() - chrono::Duration::seconds(600);
        }

        let marked = tracker.sweep_stale(Duration::from_secs(120), Utc::now());
        assert_eq!(marked, vec!["stale".to_string()]);

        assert_eq!(tracker.snapshot("stale").unwrap().status, WorkerStatus::Lost);
        assert_eq!(tracker.snapshot("fresh").unwrap().status, WorkerStatus::Started);
        assert_eq!(tracker.snapshot("done").unwrap().status, WorkerStatus::Completed);
    }

    #[test]
    fn test_heartbeat_defers_staleness() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.2.3.4").unwrap();

        {
            let mut workers = tracker.workers.lock().unwrap();
            let meta = workers.get_mut("w1").unwrap();
            meta.started_at = Utc::now() - chrono::Duration::seconds(600);
            meta.last_report_at = meta.started_at;
        }

        // A fresh heartbeat keeps the worker out of the sweep
        tracker.record_heartbeat("w1").unwrap();
        let marked = tracker.sweep_stale(Duration::from_secs(120), Utc::now());
        assert!(marked.is_empty());
    }

    #[test]
    fn test_aggregate_counts_by_status() {
        let tracker = WorkerTracker::new();
        tracker.record_start("w1", "us-west-1", "1.1.1.1").unwrap();
        tracker.record_start("w2", "us-west-1", "2.2.2.2").unwrap();
        tracker.record_start("w3", "eu-west-1", "3.3.3.3").unwrap();
        tracker.record_completion("w1", 40, 3, 1024).unwrap();
        tracker.mark_lost("w2").unwrap();

        let summary = tracker.aggregate();
        assert_eq!(summary.started, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.lost, 1);
        assert_eq!(summary.total_items_crawled, 40);
        assert_eq!(summary.total_items_failed, 3);
        assert_eq!(summary.total_bytes_uploaded, 1024);
    }

    #[test]
    fn test_apply_report_events() {
        let tracker = WorkerTracker::new();
        tracker
            .apply(&WorkerReport::Started {
                worker_id: "w1".to_string(),
                region: "us-west-1".to_string(),
                ip: "1.2.3.4".to_string(),
            })
            .unwrap();
        tracker
            .apply(&WorkerReport::Heartbeat {
                worker_id: "w1".to_string(),
            })
            .unwrap();
        tracker
            .apply(&WorkerReport::Completed {
                worker_id: "w1".to_string(),
                num_items_crawled: 7,
                num_items_failed: 1,
                bytes_uploaded: 512,
            })
            .unwrap();

        let meta = tracker.snapshot("w1").unwrap();
        assert_eq!(meta.status, WorkerStatus::Completed);
        assert_eq!(meta.num_items_crawled, 7);
    }

    #[test]
    fn test_concurrent_reports_do_not_lose_updates() {
        use std::sync::Arc;

        let tracker = Arc::new(WorkerTracker::new());
        for i in 0..16 {
            tracker
                .record_start(&format!("w{}", i), "us-west-1", "1.2.3.4")
                .unwrap();
        }

        let mut handles = Vec::new();
        for i in 0..16 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                tracker
                    .record_completion(&format!("w{}", i), 10, 0, 100)
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let summary = tracker.aggregate();
        assert_eq!(summary.completed, 16);
        assert_eq!(summary.total_items_crawled, 160);
        assert_eq!(summary.total_bytes_uploaded, 1600);
    }
}
