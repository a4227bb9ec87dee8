//! The steps behind each subcommand, generic over the instance client so they
//! run against [`HttpInstance`](crate::client::HttpInstance) in production and
//! against mocks in tests.
//!
//! Steps run in a fixed order; each selected step either completes or aborts
//! the command with its error.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use solution_promote_core::config::{PathSettings, PromoteConfig};
use solution_promote_core::contract::{Instance, RemoteFileAccess, SolutionApi};
use solution_promote_core::manifest::parse_manifest_from_csv;
use solution_promote_core::migrate::{
    deploy_latest, migrate_dependencies, migrate_solution, promote_latest, publish_all, read_embedded_manifest,
    read_embedded_package, MigrationPlan, MigrationReport,
};
use solution_promote_core::packager::{
    compile_and_package, release_solution_builder_flow, resolve_latest_artifact, stage_solution,
    SolutionBuilderRelease,
};
use solution_promote_core::paths::{file_name, join_remote, parent};
use solution_promote_core::poller::settle;
use solution_promote_core::version::extract_version;

use crate::ci;
use crate::cli::{PromoteArgs, PromoteSbArgs};

/// Filesystem flow projects.
pub async fn promote<S, T>(source: &S, target: &T, config: &PromoteConfig, args: &PromoteArgs, local_dir: &Path) -> Result<()>
where
    S: Instance + ?Sized,
    T: Instance + ?Sized,
{
    let paths = &config.paths;
    let timings = &config.timings;
    let all = args.remote_flow;

    if args.compile_source_solution {
        let solution_dir = PathSettings::require(&paths.source_solution_dir, "SOURCE_SOLUTION_DIR")?;
        let working_dir = PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?;
        let rel_flow = PathSettings::require(&paths.rel_flow_path, "REL_FLOW_PATH")?;
        let output = PathSettings::require(&paths.source_compiled_solutions_path, "SOURCE_COMPILED_SOLUTIONS_PATH")?;

        let staged = stage_solution(source, solution_dir, working_dir, rel_flow).await?;
        settle(source, &join_remote([staged.as_str(), rel_flow]), timings).await?;
        compile_and_package(source, &staged, rel_flow, output, timings)
            .await
            .context("Compiling source solution failed")?;
    }

    if args.publish_source_solution || all {
        let folder = PathSettings::require(&paths.source_compiled_solutions_path, "SOURCE_COMPILED_SOLUTIONS_PATH")?;
        release_latest(source, folder, None, args.marketplace).await?;
    }

    if args.promote_solution_to_target || all {
        let source_folder =
            PathSettings::require(&paths.source_compiled_solutions_path, "SOURCE_COMPILED_SOLUTIONS_PATH")?;
        let target_folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let promoted = promote_latest(source, target, source_folder, target_folder, None).await?;
        info!(artifact = %promoted.target_artifact, uploaded = promoted.uploaded, "Promoted solution to target");
    }

    if args.publish_target_solution || all {
        let folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        release_latest(target, folder, None, args.marketplace).await?;
    }

    if args.upload_dependencies || all {
        let target_folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let working_dir = PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?;
        let artifact = resolve_latest_artifact(target, target_folder, None).await?;
        let manifest = read_embedded_manifest(target, &artifact, parent(target_folder), timings).await?;
        let migrated = migrate_dependencies(source, target, &manifest, working_dir, target_folder, timings).await?;
        publish_all(target, &migrated).await;
    }

    if args.download_ibsolution || all {
        let folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        download_latest(target, folder, None, local_dir).await?;
    }

    if args.set_github_actions_env_var || args.set_azure_devops_env_var {
        let folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let artifact = resolve_latest_artifact(target, folder, None).await?;
        let package = read_embedded_package(target, &artifact, parent(folder), timings).await?;
        export_version(config, args.set_github_actions_env_var, args.set_azure_devops_env_var, &package.version)?;
    }
    Ok(())
}

/// Solution builder projects.
pub async fn promote_sb<S, T>(
    source: &S,
    target: &T,
    config: &PromoteConfig,
    args: &PromoteSbArgs,
    local_dir: &Path,
) -> Result<()>
where
    S: Instance + ?Sized,
    T: Instance + ?Sized,
{
    let paths = &config.paths;
    let timings = &config.timings;
    let all = args.remote_flow;
    let name = PathSettings::require(&paths.solution_builder_name, "SOLUTION_BUILDER_NAME")?;

    if args.compile_source_solution {
        let release = SolutionBuilderRelease {
            workspace_root: PathSettings::require(&paths.workspace_drive_path, "WORKSPACE_DRIVE_PATH")?.to_string(),
            project_name: name.to_string(),
            flow_name: PathSettings::require(&paths.flow_name, "FLOW_NAME")?.to_string(),
            working_dir: PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?.to_string(),
        };
        let icon = std::fs::read(&paths.icon_path)
            .with_context(|| format!("Failed to read icon file {}", paths.icon_path))?;
        let released = release_solution_builder_flow(source, &release, icon, timings)
            .await
            .context("Releasing solution builder flow failed")?;
        info!(version = %released.version, artifact = %released.artifact_path, "Compiled source solution");
    }

    if args.deploy_source_solution || all {
        let folder = PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?;
        deploy_latest(source, folder, Some(name)).await?;
    }

    if args.promote_solution_to_target || all {
        let source_folder = PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?;
        let target_folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let promoted = promote_latest(source, target, source_folder, target_folder, Some(name)).await?;
        info!(artifact = %promoted.target_artifact, uploaded = promoted.uploaded, "Promoted solution to target");
        if args.download_ibsolution {
            download(source, &promoted.source_artifact, local_dir).await?;
        }
    }

    if args.upload_dependencies || all {
        let working_dir = PathSettings::require(&paths.source_working_dir, "SOURCE_WORKING_DIR")?;
        let target_folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let manifest = parse_manifest_from_csv(paths.dependencies.as_deref().unwrap_or_default())?;
        let migrated = migrate_dependencies(source, target, &manifest, working_dir, target_folder, timings).await?;
        publish_all(target, &migrated).await;
    }

    if args.deploy_target_solution || all {
        let folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        deploy_latest(target, folder, Some(name)).await?;
    }

    if args.set_github_actions_env_var || args.set_azure_devops_env_var {
        let folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
        let artifact = resolve_latest_artifact(target, folder, Some(name)).await?;
        let version = extract_version(&artifact);
        export_version(config, args.set_github_actions_env_var, args.set_azure_devops_env_var, version)?;
    }
    Ok(())
}

/// Whole-solution migration driven by `SOLUTION_BUILD_DIR_PATH` and `TARGET_IB_PATH`.
pub async fn migrate<S, T>(source: &S, target: &T, config: &PromoteConfig) -> Result<MigrationReport>
where
    S: Instance + ?Sized,
    T: Instance + ?Sized,
{
    let plan = migration_plan(config)?;
    let report = migrate_solution(source, target, &plan, &config.timings)
        .await
        .context("Solution migration failed")?;
    info!(?report, "Migration report");
    Ok(report)
}

/// Staging defaults to the parent of the build folder; dependencies land next
/// to the promoted artifact.
pub fn migration_plan(config: &PromoteConfig) -> Result<MigrationPlan> {
    let paths = &config.paths;
    let build_dir = PathSettings::require(&paths.solution_build_dir_path, "SOLUTION_BUILD_DIR_PATH")?;
    let target_folder = PathSettings::require(&paths.target_path, "TARGET_IB_PATH")?;
    let staging = paths
        .source_working_dir
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| parent(build_dir).to_string());
    Ok(MigrationPlan {
        source_folder: build_dir.to_string(),
        name_filter: paths.solution_builder_name.clone(),
        target_folder: target_folder.to_string(),
        source_staging_folder: staging,
        target_dependencies_parent: target_folder.to_string(),
    })
}

async fn release_latest<I>(api: &I, folder: &str, name_filter: Option<&str>, marketplace: bool) -> Result<()>
where
    I: Instance + ?Sized,
{
    if marketplace {
        let path = resolve_latest_artifact(api, folder, name_filter).await?;
        if publish_all(api, &[path]).await.is_empty() {
            warn!(folder, "Latest solution was not published");
        }
    } else {
        deploy_latest(api, folder, name_filter).await?;
    }
    Ok(())
}

/// Writes the latest artifact of `folder` into `local_dir`.
pub async fn download_latest<F>(files: &F, folder: &str, name_filter: Option<&str>, local_dir: &Path) -> Result<PathBuf>
where
    F: RemoteFileAccess + ?Sized,
{
    let artifact = resolve_latest_artifact(files, folder, name_filter).await?;
    download(files, &artifact, local_dir).await
}

async fn download<F>(files: &F, remote_path: &str, local_dir: &Path) -> Result<PathBuf>
where
    F: RemoteFileAccess + ?Sized,
{
    let bytes = files.read(remote_path).await?;
    let local = local_dir.join(file_name(remote_path));
    std::fs::write(&local, &bytes).with_context(|| format!("Failed to write {local:?}"))?;
    info!(remote = %remote_path, local = ?local, size = bytes.len(), "Downloaded ibsolution");
    Ok(local)
}

fn export_version(config: &PromoteConfig, github: bool, azure: bool, version: &str) -> Result<()> {
    if github {
        let env_file = PathSettings::require(&config.paths.github_env, "GITHUB_ENV")?;
        ci::export_github_env(Path::new(env_file), version)?;
    }
    if azure {
        ci::export_azure_devops(version);
    }
    Ok(())
}
