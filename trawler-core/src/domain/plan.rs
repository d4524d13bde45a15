//! Dispatch plan domain types
//!
//! A [`DispatchPlan`] is the fully-resolved description of one crawl job,
//! ready to hand to an execution environment. It is constructed once per job
//! and never mutated afterwards; a retry is always a new plan with a new id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::log::LogLevel;

/// Which kind of execution environment runs the plan
///
/// Determines the invocation strategy the coordinator uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionEnvironment {
    /// Remote managed function (e.g. AWS Lambda)
    Lambda,
    /// Containerized worker managed by the coordinator host
    Docker,
    /// Subprocess on the coordinator host
    Local,
}

/// How the crawl result flows back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultPolicy {
    /// Result is returned synchronously in the invocation response
    Return,
    /// Worker persists the result itself; the caller gets a pointer/ack
    StoreInCloud,
}

/// How stored items are keyed
///
/// Only meaningful when [`ResultPolicy::StoreInCloud`] applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoragePolicy {
    /// Each crawled item stored under its own key
    Itemwise,
    /// All items combined into one serialized blob
    Merged,
}

/// Environment-specific connection config for a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Account/profile token used for deployment and invocation
    pub profile: String,
    /// Region the worker runs in (or is invoked from)
    pub region: String,
    /// Bucket results land in when the worker stores them itself
    pub bucket: Option<String>,
    /// Name of the remote function to invoke
    pub function_name: String,
    /// Endpoint override for the invocation URL
    ///
    /// When unset, the standard regional endpoint for the managed-function
    /// provider is used. Tests and self-hosted deployments set this.
    pub endpoint: Option<String>,
}

/// Fully-resolved description of one crawl job
///
/// Immutable value: everything a worker needs to execute is embedded here,
/// including the fetched scraper source text. The serialized form of this
/// struct is the invocation payload a worker must accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchPlan {
    /// Unique id of this plan; a retry constructs a new plan with a new id
    pub plan_id: Uuid,
    /// Ordered target items (URLs or queries)
    pub items: Vec<String>,
    /// Scraper source text shipped to the worker
    pub function_code: String,
    /// Credential token the worker uses for its own API calls
    pub api_key: String,
    /// Optional proxy endpoint for the worker's outbound traffic
    pub proxy: Option<String>,
    /// Worker-side log verbosity
    pub loglevel: LogLevel,
    pub execution_env: ExecutionEnvironment,
    pub result_policy: ResultPolicy,
    pub storage_policy: StoragePolicy,
    pub cloud: CloudConfig,
}

impl DispatchPlan {
    /// Creates a new plan with a fresh id
    ///
    /// Proxy defaults to none and log level to [`LogLevel::Info`]; use
    /// [`with_proxy`](Self::with_proxy) and
    /// [`with_loglevel`](Self::with_loglevel) at construction time to change
    /// them.
    pub fn new(
        items: Vec<String>,
        function_code: String,
        api_key: String,
        execution_env: ExecutionEnvironment,
        result_policy: ResultPolicy,
        storage_policy: StoragePolicy,
        cloud: CloudConfig,
    ) -> Self {
        Self {
            plan_id: Uuid::new_v4(),
            items,
            function_code,
            api_key,
            proxy: None,
            loglevel: LogLevel::Info,
            execution_env,
            result_policy,
            storage_policy,
            cloud,
        }
    }

    /// Sets the proxy endpoint (construction time only)
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the worker log verbosity (construction time only)
    pub fn with_loglevel(mut self, loglevel: LogLevel) -> Self {
        self.loglevel = loglevel;
        self
    }
}
