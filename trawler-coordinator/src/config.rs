//! Coordinator configuration
//!
//! Defines all configurable parameters for the coordinator including fetch
//! and invocation timeouts, the region list for rollouts, and the liveness
//! thresholds for the worker tracker.

use std::time::Duration;

/// Coordinator configuration
///
/// All timeouts and intervals are explicit so they can be tuned per
/// deployment. The heartbeat timeout in particular is a policy choice: a
/// worker whose reports are older than it is declared lost.
#[derive(Debug, Clone)]
pub struct Config {
    /// Regions a rollout deploys to, in order
    pub regions: Vec<String>,

    /// Account/profile token passed to deployment actions
    pub profile: String,

    /// Maximum time a code fetch may take
    pub fetch_timeout: Duration,

    /// Maximum time a single invocation may take (lambda only; subprocess
    /// invokers run until the worker exits)
    pub invoke_timeout: Duration,

    /// Reports older than this mark a started worker as lost
    pub heartbeat_timeout: Duration,

    /// How often the liveness monitor sweeps for stale workers
    pub liveness_check_interval: Duration,

    /// Bound on concurrently in-flight invocations
    pub max_concurrent_invocations: usize,

    /// Image the docker invoker runs
    pub worker_image: String,

    /// Command the local invoker spawns, whitespace-separated
    pub worker_command: String,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(regions: Vec<String>, profile: String) -> Self {
        Self {
            regions,
            profile,
            fetch_timeout: Duration::from_secs(30),
            invoke_timeout: Duration::from_secs(900),
            heartbeat_timeout: Duration::from_secs(120),
            liveness_check_interval: Duration::from_secs(30),
            max_concurrent_invocations: 8,
            worker_image: "trawler-worker:latest".to_string(),
            worker_command: "trawler-worker".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - TRAWLER_REGIONS (required, comma-separated)
    /// - TRAWLER_PROFILE (required)
    /// - TRAWLER_FETCH_TIMEOUT (optional, seconds, default: 30)
    /// - TRAWLER_INVOKE_TIMEOUT (optional, seconds, default: 900)
    /// - TRAWLER_HEARTBEAT_TIMEOUT (optional, seconds, default: 120)
    /// - TRAWLER_LIVENESS_INTERVAL (optional, seconds, default: 30)
    /// - TRAWLER_MAX_CONCURRENT_INVOCATIONS (optional, default: 8)
    /// - TRAWLER_WORKER_IMAGE (optional)
    /// - TRAWLER_WORKER_COMMAND (optional)
    pub fn from_env() -> anyhow::Result<Self> {
        let regions = std::env::var("TRAWLER_REGIONS")
            .map_err(|_| anyhow::anyhow!("TRAWLER_REGIONS environment variable not set"))?
            .split(',')
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .collect::<Vec<_>>();

        let profile = std::env::var("TRAWLER_PROFILE")
            .map_err(|_| anyhow::anyhow!("TRAWLER_PROFILE environment variable not set"))?;

        let mut config = Self::new(regions, profile);

        if let Some(secs) = env_secs("TRAWLER_FETCH_TIMEOUT") {
            config.fetch_timeout = secs;
        }
        if let Some(secs) = env_secs("TRAWLER_INVOKE_TIMEOUT") {
            config.invoke_timeout = secs;
        }
        if let Some(secs) = env_secs("TRAWLER_HEARTBEAT_TIMEOUT") {
            config.heartbeat_timeout = secs;
        }
        if let Some(secs) = env_secs("TRAWLER_LIVENESS_INTERVAL") {
            config.liveness_check_interval = secs;
        }
        if let Some(n) = std::env::var("TRAWLER_MAX_CONCURRENT_INVOCATIONS")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
        {
            config.max_concurrent_invocations = n;
        }
        if let Ok(image) = std::env::var("TRAWLER_WORKER_IMAGE") {
            config.worker_image = image;
        }
        if let Ok(command) = std::env::var("TRAWLER_WORKER_COMMAND") {
            config.worker_command = command;
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.regions.is_empty() {
            anyhow::bail!("regions cannot be empty");
        }

        if self.regions.iter().any(|r| r.is_empty()) {
            anyhow::bail!("region names cannot be empty");
        }

        if self.profile.is_empty() {
            anyhow::bail!("profile cannot be empty");
        }

        if self.fetch_timeout.is_zero() {
            anyhow::bail!("fetch_timeout must be greater than 0");
        }

        if self.heartbeat_timeout.is_zero() {
            anyhow::bail!("heartbeat_timeout must be greater than 0");
        }

        if self.liveness_check_interval.is_zero() {
            anyhow::bail!("liveness_check_interval must be greater than 0");
        }

        if self.max_concurrent_invocations == 0 {
            anyhow::bail!("max_concurrent_invocations must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(vec!["us-west-1".to_string()], "default".to_string())
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
}
