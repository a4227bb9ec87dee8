/// `load_config` module: reads the process environment once into a [`PromoteConfig`].
///
/// This is the only place that looks at environment variables. Everything
/// downstream receives the resulting struct.
///
/// # Variables
/// - Required: `SOURCE_IB_HOST`, `SOURCE_IB_API_TOKEN`, `TARGET_IB_HOST`, `TARGET_IB_API_TOKEN`
/// - Paths and names, checked by the step that needs them: `TARGET_IB_PATH`,
///   `SOURCE_WORKING_DIR`, `SOURCE_SOLUTION_DIR`, `SOURCE_COMPILED_SOLUTIONS_PATH`,
///   `REL_FLOW_PATH`, `SOLUTION_BUILDER_NAME`, `FLOW_NAME`, `WORKSPACE_DRIVE_PATH`,
///   `DEPENDENCIES`, `SOLUTION_BUILD_DIR_PATH`, `GITHUB_ENV`, `ICON_PATH`
/// - Tunables: `IB_UPLOAD_CHUNK_SIZE` (bytes), `IB_JOB_POLL_SECONDS`, `IB_GRACE_SECONDS`
///
/// # Errors
/// All errors in this module use `anyhow::Error` and are surfaced at the CLI boundary.
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use solution_promote_core::config::{InstanceConfig, PromoteConfig};
use solution_promote_core::error::PromoteError;
use tracing::{error, info};

/// Loads configuration from the process environment.
pub fn load_config() -> Result<PromoteConfig> {
    load_config_from(|key| std::env::var(key).ok())
}

/// Loads configuration through `lookup`; blank values count as unset.
pub fn load_config_from<F>(lookup: F) -> Result<PromoteConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let required = |key: &'static str| {
        get(key).ok_or_else(|| {
            error!(variable = key, "Required configuration missing");
            anyhow::Error::new(PromoteError::MissingConfig(key))
        })
    };

    let source = InstanceConfig::new(required("SOURCE_IB_HOST")?, required("SOURCE_IB_API_TOKEN")?);
    let target = InstanceConfig::new(required("TARGET_IB_HOST")?, required("TARGET_IB_API_TOKEN")?);
    let mut config = PromoteConfig::new(source, target);

    let paths = &mut config.paths;
    paths.target_path = get("TARGET_IB_PATH");
    paths.source_working_dir = get("SOURCE_WORKING_DIR");
    paths.source_solution_dir = get("SOURCE_SOLUTION_DIR");
    paths.source_compiled_solutions_path = get("SOURCE_COMPILED_SOLUTIONS_PATH");
    paths.rel_flow_path = get("REL_FLOW_PATH");
    paths.solution_builder_name = get("SOLUTION_BUILDER_NAME");
    paths.flow_name = get("FLOW_NAME");
    paths.workspace_drive_path = get("WORKSPACE_DRIVE_PATH");
    paths.dependencies = get("DEPENDENCIES");
    paths.solution_build_dir_path = get("SOLUTION_BUILD_DIR_PATH");
    paths.github_env = get("GITHUB_ENV");
    if let Some(icon) = get("ICON_PATH") {
        paths.icon_path = icon;
    }

    if let Some(size) = parse_var::<usize>(&get, "IB_UPLOAD_CHUNK_SIZE")? {
        anyhow::ensure!(size > 0, "IB_UPLOAD_CHUNK_SIZE must be greater than zero");
        config.chunk_size = size;
    }
    if let Some(secs) = parse_var::<u64>(&get, "IB_JOB_POLL_SECONDS")? {
        config.timings.poll_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = parse_var::<u64>(&get, "IB_GRACE_SECONDS")? {
        config.timings.grace_period = Duration::from_secs(secs);
    }

    info!("Configuration loaded from environment");
    config.trace_loaded();
    Ok(config)
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} must be a number, got '{raw}'"))
        })
        .transpose()
}
