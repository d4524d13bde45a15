//! Invocation response wire contract

use serde::{Deserialize, Serialize};

/// Structured response of one worker invocation
///
/// Mirrors success (extracted data or a storage acknowledgment) or failure
/// (error kind + message). The shape a worker returns depends on the plan's
/// result policy: `data` for `return`, `stored` for `store_in_cloud`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum InvocationResponse {
    /// Extracted data flows back inline
    Data { items: serde_json::Value },
    /// Worker persisted the result itself; `location` points at it
    Stored { location: String, num_items: u64 },
    /// Worker-surfaced execution failure
    Error { kind: String, message: String },
}

impl InvocationResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, InvocationResponse::Error { .. })
    }
}
