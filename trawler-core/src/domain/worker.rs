//! Worker lifecycle domain types
//!
//! A worker passes through a small closed state machine:
//! `started -> completed` or `started -> lost`. Both end states are terminal;
//! `lost` is only ever assigned by the coordinator when a worker stops
//! reporting, never by the worker itself. Transition logic lives in the
//! coordinator's tracker; this module holds the record and its invariant
//! helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on retained debug traces per worker
pub const MAX_TRACES: usize = 32;

/// Lifecycle state of one worker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// Worker reported in and is presumed running
    Started,
    /// Worker reported completion
    Completed,
    /// Worker stopped reporting before completion (timeout-inferred)
    Lost,
}

impl WorkerStatus {
    /// Whether this state permits no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerStatus::Completed | WorkerStatus::Lost)
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerStatus::Started => write!(f, "started"),
            WorkerStatus::Completed => write!(f, "completed"),
            WorkerStatus::Lost => write!(f, "lost"),
        }
    }
}

/// Telemetry record for one worker invocation
///
/// Owned exclusively by the coordinator's tracker. Created at `started`,
/// updated in place as reports arrive, frozen once the status is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerMeta {
    pub worker_id: String,
    pub status: WorkerStatus,
    pub started_at: DateTime<Utc>,
    /// Set when the status becomes terminal
    pub ended_at: Option<DateTime<Utc>>,
    /// Time of the most recent report from this worker; the liveness check
    /// compares against this, not `started_at`
    pub last_report_at: DateTime<Utc>,
    /// Derived throughput; defined only when completed with nonzero elapsed
    pub average_items_per_second: Option<f64>,
    pub num_items_crawled: u64,
    pub num_items_failed: u64,
    pub bytes_uploaded: u64,
    /// Region the worker reported in from
    pub region: String,
    /// Source IP the worker reported in from
    pub ip: String,
    /// Free-form status text for operator display
    pub status_text: Option<String>,
    /// Bounded list of debug traces, oldest dropped past [`MAX_TRACES`]
    pub traces: Vec<String>,
}

impl WorkerMeta {
    /// Creates a fresh record in `started` state
    pub fn new(
        worker_id: impl Into<String>,
        region: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            worker_id: worker_id.into(),
            status: WorkerStatus::Started,
            started_at: now,
            ended_at: None,
            last_report_at: now,
            average_items_per_second: None,
            num_items_crawled: 0,
            num_items_failed: 0,
            bytes_uploaded: 0,
            region: region.into(),
            ip: ip.into(),
            status_text: None,
            traces: Vec::new(),
        }
    }

    /// Whether the record is frozen
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Appends a debug trace, dropping the oldest once the bound is reached
    pub fn push_trace(&mut self, trace: impl Into<String>) {
        if self.traces.len() == MAX_TRACES {
            self.traces.remove(0);
        }
        self.traces.push(trace.into());
    }
}
