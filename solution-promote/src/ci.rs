//! Hand the promoted package version to the CI system running the tool.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

pub const VERSION_VARIABLE: &str = "PACKAGE_VERSION";

/// Appends `PACKAGE_VERSION={version}` to the GitHub Actions env file.
pub fn export_github_env(env_file: &Path, version: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(env_file)
        .with_context(|| format!("Failed to open GITHUB_ENV file {env_file:?}"))?;
    writeln!(file, "{VERSION_VARIABLE}={version}")
        .with_context(|| format!("Failed to write GITHUB_ENV file {env_file:?}"))?;
    info!(env_file = ?env_file, version, "Exported package version for GitHub Actions");
    Ok(())
}

/// Logging command that sets the pipeline variable in Azure DevOps.
pub fn azure_devops_command(version: &str) -> String {
    format!("##vso[task.setvariable variable={VERSION_VARIABLE};]{version}")
}

pub fn export_azure_devops(version: &str) {
    println!("{}", azure_devops_command(version));
    info!(version, "Exported package version for Azure DevOps");
}
