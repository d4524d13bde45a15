//! Job invocation
//!
//! Delivers one [`DispatchPlan`] to exactly one execution environment and
//! returns its structured result. Three strategies, one per environment:
//! a remote managed function invoked over HTTP, a container run on the
//! coordinator host, and a plain subprocess. The subprocess strategies share
//! a stdin/stdout contract: plan JSON in, response JSON out.
//!
//! No retries here. A caller that wants to retry constructs a fresh plan and
//! invokes again. Caller-side cancellation is dropping the future; the
//! tracker record stays `started` for the liveness monitor to resolve.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::debug;

use trawler_core::domain::plan::{CloudConfig, DispatchPlan, ExecutionEnvironment};
use trawler_core::dto::invocation::InvocationResponse;

use crate::config::Config;

/// Errors that can occur while invoking a plan
///
/// Each is distinguishable to the caller so a failure can be attributed to a
/// specific worker; none are silently swallowed.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// Transport/connection/spawn failure before the worker produced a result
    #[error("invocation failed: {0}")]
    Invoke(String),

    /// The worker itself reported an execution error
    #[error("worker error [{kind}]: {message}")]
    Worker { kind: String, message: String },

    /// The worker responded, but the response could not be decoded
    #[error("could not decode invocation response: {0}")]
    ResponseFormat(String),
}

/// Strategy for delivering a plan to one execution environment
#[async_trait]
pub trait JobInvoker: Send + Sync {
    /// Invokes the plan and waits for its structured result
    ///
    /// The returned response is never the `error` variant; worker-surfaced
    /// errors come back as [`InvokeError::Worker`].
    async fn invoke(&self, plan: &DispatchPlan) -> Result<InvocationResponse, InvokeError>;
}

/// Picks the invoker strategy for an execution environment
pub fn invoker_for(config: &Config, env: ExecutionEnvironment) -> Box<dyn JobInvoker> {
    match env {
        ExecutionEnvironment::Lambda => Box::new(LambdaInvoker::new(config.invoke_timeout)),
        ExecutionEnvironment::Docker => {
            Box::new(ContainerInvoker::new(config.worker_image.clone()))
        }
        ExecutionEnvironment::Local => {
            let mut parts = config.worker_command.split_whitespace();
            let program = parts.next().unwrap_or("trawler-worker").to_string();
            let args = parts.map(str::to_string).collect();
            Box::new(LocalInvoker::new(program, args))
        }
    }
}

// =============================================================================
// Lambda
// =============================================================================

/// Invokes a named remote function over HTTP
#[derive(Debug, Clone)]
pub struct LambdaInvoker {
    client: reqwest::Client,
    timeout: Duration,
}

impl LambdaInvoker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    /// Builds the invocation URL from the plan's cloud config
    ///
    /// The endpoint override wins when set; otherwise the standard regional
    /// Lambda endpoint is used.
    fn invocation_url(cloud: &CloudConfig) -> String {
        match &cloud.endpoint {
            Some(endpoint) => format!(
                "{}/2015-03-31/functions/{}/invocations",
                endpoint.trim_end_matches('/'),
                cloud.function_name
            ),
            None => format!(
                "https://lambda.{}.amazonaws.com/2015-03-31/functions/{}/invocations",
                cloud.region, cloud.function_name
            ),
        }
    }
}

#[async_trait]
impl JobInvoker for LambdaInvoker {
    async fn invoke(&self, plan: &DispatchPlan) -> Result<InvocationResponse, InvokeError> {
        let url = Self::invocation_url(&plan.cloud);
        debug!(plan_id = %plan.plan_id, %url, items = plan.items.len(), "invoking remote function");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(plan)
            .send()
            .await
            .map_err(|e| InvokeError::Invoke(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(InvokeError::Invoke(format!(
                "function returned status {}: {}",
                status,
                body.trim()
            )));
        }

        let parsed = response
            .json::<InvocationResponse>()
            .await
            .map_err(|e| InvokeError::ResponseFormat(e.to_string()))?;

        into_result(parsed)
    }
}

// =============================================================================
// Container and local subprocess
// =============================================================================

/// Runs the worker image in a disposable container
#[derive(Debug, Clone)]
pub struct ContainerInvoker {
    image: String,
}

impl ContainerInvoker {
    pub fn new(image: String) -> Self {
        Self { image }
    }
}

#[async_trait]
impl JobInvoker for ContainerInvoker {
    async fn invoke(&self, plan: &DispatchPlan) -> Result<InvocationResponse, InvokeError> {
        debug!(plan_id = %plan.plan_id, image = %self.image, "invoking containerized worker");

        let mut command = Command::new("docker");
        command.args(["run", "--rm", "-i"]).arg(&self.image);
        run_stdio_worker(command, plan).await
    }
}

/// Runs the worker command as a subprocess on this host
#[derive(Debug, Clone)]
pub struct LocalInvoker {
    program: String,
    args: Vec<String>,
}

impl LocalInvoker {
    pub fn new(program: String, args: Vec<String>) -> Self {
        Self { program, args }
    }
}

#[async_trait]
impl JobInvoker for LocalInvoker {
    async fn invoke(&self, plan: &DispatchPlan) -> Result<InvocationResponse, InvokeError> {
        debug!(plan_id = %plan.plan_id, program = %self.program, "invoking local worker");

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        run_stdio_worker(command, plan).await
    }
}

/// Shared subprocess contract: plan JSON on stdin, response JSON on stdout
async fn run_stdio_worker(
    mut command: Command,
    plan: &DispatchPlan,
) -> Result<InvocationResponse, InvokeError> {
    let payload =
        serde_json::to_vec(plan).map_err(|e| InvokeError::Invoke(e.to_string()))?;

    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| InvokeError::Invoke(format!("failed to spawn worker: {}", e)))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| InvokeError::Invoke("worker stdin unavailable".to_string()))?;
    stdin
        .write_all(&payload)
        .await
        .map_err(|e| InvokeError::Invoke(format!("failed to write payload: {}", e)))?;
    drop(stdin);

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| InvokeError::Invoke(e.to_string()))?;

    if !output.status.success() {
        // Prefer the worker's own error payload when it printed one
        if let Ok(InvocationResponse::Error { kind, message }) =
            serde_json::from_slice::<InvocationResponse>(&output.stdout)
        {
            return Err(InvokeError::Worker { kind, message });
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(InvokeError::Worker {
            kind: format!("exit_{}", output.status.code().unwrap_or(-1)),
            message: stderr.trim().to_string(),
        });
    }

    let parsed = serde_json::from_slice::<InvocationResponse>(&output.stdout)
        .map_err(|e| InvokeError::ResponseFormat(e.to_string()))?;

    into_result(parsed)
}

/// Surfaces the worker's `error` response variant as [`InvokeError::Worker`]
fn into_result(response: InvocationResponse) -> Result<InvocationResponse, InvokeError> {
    match response {
        InvocationResponse::Error { kind, message } => Err(InvokeError::Worker { kind, message }),
        other => Ok(other),
    }
}

// =============================================================================
// Fan-out
// =============================================================================

/// Invokes many plans with a bounded number in flight
///
/// One outcome per plan, in plan order; a failed invocation never cancels or
/// corrupts its siblings.
pub async fn invoke_all(
    invoker: Arc<dyn JobInvoker>,
    plans: Vec<DispatchPlan>,
    limit: usize,
) -> Vec<Result<InvocationResponse, InvokeError>> {
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut handles = Vec::with_capacity(plans.len());

    for plan in plans {
        let invoker = Arc::clone(&invoker);
        let semaphore = Arc::clone(&semaphore);
        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return Err(InvokeError::Invoke("invocation pool closed".to_string())),
            };
            invoker.invoke(&plan).await
        }));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for handle in handles {
        outcomes.push(match handle.await {
            Ok(outcome) => outcome,
            Err(e) => Err(InvokeError::Invoke(format!("invocation task panicked: {}", e))),
        });
    }
    outcomes
}
