use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::contract::DEFAULT_CHUNK_SIZE;
use crate::error::{PromoteError, Result};

/// Where one platform instance lives and how to authenticate against it.
#[derive(Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub host: String,
    pub token: String,
}

impl InstanceConfig {
    pub fn new(host: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            host: host.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

impl fmt::Debug for InstanceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceConfig")
            .field("host", &self.host)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Delays used while waiting on the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Interval between job-status probes.
    pub poll_interval: Duration,
    /// Longest best-effort wait after submitting an operation the remote does
    /// not report completion for.
    pub grace_period: Duration,
    /// Interval between existence checks while settling within the grace period.
    pub settle_interval: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            grace_period: Duration::from_secs(6),
            settle_interval: Duration::from_secs(1),
        }
    }
}

impl Timings {
    /// No waiting at all; for tests and dry runs against fakes.
    pub fn immediate() -> Self {
        Self {
            poll_interval: Duration::ZERO,
            grace_period: Duration::ZERO,
            settle_interval: Duration::ZERO,
        }
    }
}

/// Everything one run needs, read once at process start.
#[derive(Debug, Clone)]
pub struct PromoteConfig {
    pub source: InstanceConfig,
    pub target: InstanceConfig,
    pub paths: PathSettings,
    pub timings: Timings,
    pub chunk_size: usize,
}

/// Remote and local locations. Each is optional; steps that need one ask for
/// it through [`PathSettings::require`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSettings {
    pub target_path: Option<String>,
    pub source_working_dir: Option<String>,
    pub source_solution_dir: Option<String>,
    pub source_compiled_solutions_path: Option<String>,
    pub rel_flow_path: Option<String>,
    pub solution_builder_name: Option<String>,
    pub flow_name: Option<String>,
    pub workspace_drive_path: Option<String>,
    pub dependencies: Option<String>,
    pub solution_build_dir_path: Option<String>,
    pub github_env: Option<String>,
    pub icon_path: String,
}

impl PathSettings {
    /// Returns the value or a `MissingConfig` error naming the variable.
    pub fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or(PromoteError::MissingConfig(name))
    }
}

impl PromoteConfig {
    pub fn new(source: InstanceConfig, target: InstanceConfig) -> Self {
        Self {
            source,
            target,
            paths: PathSettings {
                icon_path: "icon.png".to_string(),
                ..PathSettings::default()
            },
            timings: Timings::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn trace_loaded(&self) {
        info!(
            source_host = %self.source.host,
            target_host = %self.target.host,
            chunk_size = self.chunk_size,
            poll_interval_secs = self.timings.poll_interval.as_secs(),
            "Loaded PromoteConfig"
        );
        debug!(?self, "PromoteConfig loaded (full debug)");
    }
}
