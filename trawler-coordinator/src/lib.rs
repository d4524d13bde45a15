//! Trawler Coordinator
//!
//! Coordinates a web-scraping workload across many ephemeral execution
//! environments. The coordinator ships scraper source text to workers,
//! supplies runtime parameters, and collects per-worker telemetry.
//!
//! Architecture:
//! - Configuration: settings from environment or defaults
//! - Fetch: retrieve (and transparently gunzip) scraper source from a URL
//! - Invoke: deliver one dispatch plan to one execution environment
//! - Rollout: stand up the worker environment across a list of regions
//! - Status: the worker lifecycle state machine and its aggregation
//! - Liveness: mark workers lost when their reports go stale
//!
//! CLI parsing, process bootstrapping, and persistence belong to the
//! embedding process; none of these modules install a tracing subscriber.

pub mod config;
pub mod fetch;
pub mod invoke;
pub mod liveness;
pub mod rollout;
pub mod status;

pub use config::Config;
pub use fetch::{CodeFetcher, FetchError};
pub use invoke::{InvokeError, JobInvoker, invoke_all, invoker_for};
pub use liveness::LivenessMonitor;
pub use rollout::{CommandDeployAction, DeployAction, RegionRollout, RolloutReport, RolloutStatus};
pub use status::{StatsSummary, StatusError, WorkerTracker};
