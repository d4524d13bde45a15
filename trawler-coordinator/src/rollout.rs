//! Region rollout
//!
//! Applies the same deployment action independently across a configured list
//! of regions. A build/packaging pre-step runs exactly once before any region
//! is attempted; after that every region is attempted exactly once, in order,
//! and a region's failure never stops the regions after it. The aggregate
//! report enumerates every region's outcome; the rollout as a whole is
//! degraded (not fatal) when a subset failed, and only fails wholesale when
//! the pre-step does.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{error, info, warn};

use crate::config::Config;

/// Failure of one deployment action invocation
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ActionError(pub String);

/// Wholesale rollout failure
#[derive(Debug, Error)]
pub enum RolloutError {
    /// The build/packaging pre-step failed; no region was attempted
    #[error("rollout pre-step failed: {0}")]
    PrestepFailed(#[source] ActionError),
}

/// The opaque build/deploy seam
///
/// `prepare` runs once per rollout; `deploy` runs once per region.
#[async_trait]
pub trait DeployAction: Send + Sync {
    /// Builds/packages the deployable artifact
    async fn prepare(&self) -> Result<String, ActionError>;

    /// Deploys the artifact to one region under the given profile
    async fn deploy(&self, region: &str, profile: &str) -> Result<String, ActionError>;
}

/// Outcome of one region's deployment
#[derive(Debug, Clone, Serialize)]
pub struct RegionOutcome {
    pub region: String,
    pub succeeded: bool,
    /// Command output on success, error text on failure
    pub detail: String,
}

/// Overall rollout status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RolloutStatus {
    /// Every region succeeded
    Succeeded,
    /// Some subset of regions failed
    Degraded,
}

/// Aggregate result of one rollout: one outcome per configured region
#[derive(Debug, Clone, Serialize)]
pub struct RolloutReport {
    pub outcomes: Vec<RegionOutcome>,
}

impl RolloutReport {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    pub fn status(&self) -> RolloutStatus {
        if self.failed_count() == 0 {
            RolloutStatus::Succeeded
        } else {
            RolloutStatus::Degraded
        }
    }
}

/// Fans a deployment action out across a statically configured region list
#[derive(Debug, Clone)]
pub struct RegionRollout {
    regions: Vec<String>,
    profile: String,
}

impl RegionRollout {
    pub fn new(regions: Vec<String>, profile: String) -> Self {
        Self { regions, profile }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.regions.clone(), config.profile.clone())
    }

    /// Runs the rollout
    ///
    /// # Returns
    /// A report with exactly one outcome per configured region, or
    /// [`RolloutError::PrestepFailed`] when the pre-step fails (in which case
    /// no region was attempted).
    pub async fn run(&self, action: &dyn DeployAction) -> Result<RolloutReport, RolloutError> {
        info!(regions = self.regions.len(), "starting rollout");

        match action.prepare().await {
            Ok(output) => {
                if !output.trim().is_empty() {
                    info!("pre-step output: {}", output.trim());
                }
            }
            Err(e) => {
                error!("rollout pre-step failed: {}", e);
                return Err(RolloutError::PrestepFailed(e));
            }
        }

        let mut outcomes = Vec::with_capacity(self.regions.len());
        for region in &self.regions {
            let outcome = match action.deploy(region, &self.profile).await {
                Ok(output) => {
                    info!(%region, "region deployed");
                    RegionOutcome {
                        region: region.clone(),
                        succeeded: true,
                        detail: output,
                    }
                }
                Err(e) => {
                    warn!(%region, "region deployment failed: {}", e);
                    RegionOutcome {
                        region: region.clone(),
                        succeeded: false,
                        detail: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RolloutReport { outcomes };
        info!(
            succeeded = report.succeeded_count(),
            failed = report.failed_count(),
            "rollout finished"
        );
        Ok(report)
    }
}

// =============================================================================
// Shell-command deployment action
// =============================================================================

/// Deployment action backed by shell commands
///
/// The region and profile are exposed to the deploy command as
/// `TRAWLER_REGION` and `TRAWLER_PROFILE`.
#[derive(Debug, Clone)]
pub struct CommandDeployAction {
    prepare_command: Option<String>,
    deploy_command: String,
}

impl CommandDeployAction {
    pub fn new(prepare_command: Option<String>, deploy_command: String) -> Self {
        Self {
            prepare_command,
            deploy_command,
        }
    }
}

#[async_trait]
impl DeployAction for CommandDeployAction {
    async fn prepare(&self) -> Result<String, ActionError> {
        match &self.prepare_command {
            Some(command) => run_shell(command, &[]).await,
            None => Ok(String::new()),
        }
    }

    async fn deploy(&self, region: &str, profile: &str) -> Result<String, ActionError> {
        run_shell(
            &self.deploy_command,
            &[("TRAWLER_REGION", region), ("TRAWLER_PROFILE", profile)],
        )
        .await
    }
}

async fn run_shell(command: &str, envs: &[(&str, &str)]) -> Result<String, ActionError> {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    for (key, value) in envs {
        shell.env(key, value);
    }

    let output = shell
        .output()
        .await
        .map_err(|e| ActionError(format!("failed to spawn `{}`: {}", command, e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    if output.status.success() {
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(ActionError(format!(
            "exit {}: {}",
            output.status.code().unwrap_or(-1),
            stderr.trim()
        )))
    }
}
