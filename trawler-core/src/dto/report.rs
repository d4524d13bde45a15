//! Worker report wire contract
//!
//! Workers emit these events over the heartbeat/report channel, identified
//! by worker id. The coordinator's status tracker is the sole consumer.

use serde::{Deserialize, Serialize};

/// One event on the heartbeat/report channel
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerReport {
    /// Worker began executing its plan
    Started {
        worker_id: String,
        region: String,
        ip: String,
    },
    /// Worker is still alive; carries no counters
    Heartbeat { worker_id: String },
    /// Worker finished and reports its final counters
    Completed {
        worker_id: String,
        num_items_crawled: u64,
        num_items_failed: u64,
        bytes_uploaded: u64,
    },
}

impl WorkerReport {
    /// Id of the worker this event belongs to
    pub fn worker_id(&self) -> &str {
        match self {
            WorkerReport::Started { worker_id, .. } => worker_id,
            WorkerReport::Heartbeat { worker_id } => worker_id,
            WorkerReport::Completed { worker_id, .. } => worker_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_tagging() {
        let report = WorkerReport::Started {
            worker_id: "w1".to_string(),
            region: "us-west-1".to_string(),
            ip: "1.2.3.4".to_string(),
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["event"], "started");
        assert_eq!(report.worker_id(), "w1");
    }

    #[test]
    fn test_completed_roundtrip() {
        let report = WorkerReport::Completed {
            worker_id: "w2".to_string(),
            num_items_crawled: 40,
            num_items_failed: 3,
            bytes_uploaded: 2048,
        };
        let json = serde_json::to_string(&report).unwrap();
        let back: WorkerReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.worker_id(), "w2");
    }
}
