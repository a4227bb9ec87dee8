//! Compile flows into binaries and package binaries into versioned
//! `.ibsolution` archives.
//!
//! Two project layouts are supported:
//! - filesystem flow projects, where a flow lives at
//!   `{solution_dir}/{relative_flow_path}` and is staged into a working dir
//!   before compiling ([`stage_solution`], [`compile_and_package`]);
//! - solution builder projects, where versioned flows live under
//!   `.instabase_projects/{project}/latest/flows` and every release bumps the
//!   patch version ([`release_solution_builder_flow`]).

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::config::Timings;
use crate::contract::{CompileRequest, CompileSettings, RemoteFileAccess, SolutionApi};
use crate::error::{PromoteError, Result};
use crate::manifest::{artifact_file_name, SolutionPackage};
use crate::paths::{file_name, file_stem, join_remote, parent};
use crate::poller::{grace_delay, settle};
use crate::version::{extract_version, is_version_stem, pick_latest, ArtifactVersion};

pub const SOLUTION_EXTENSION: &str = ".ibsolution";
const FLOW_EXTENSION: &str = ".ibflow";
const FLOW_BINARY_EXTENSION: &str = ".ibflowbin";
const SINGLE_FLOW: &str = "Single Flow";

/// Leading path components of a solution builder flow that form the project root
/// (`owner/repo/fs/drive/.instabase_projects/{project}/latest`).
const SOLUTION_BUILDER_ROOT_DEPTH: usize = 7;

impl CompileRequest {
    /// Compile request for `{solution_path}/{relative_flow_path}`; the binary is
    /// written next to the flow.
    pub fn for_filesystem_flow(solution_path: &str, relative_flow_path: &str) -> Self {
        let binary_rel = relative_flow_path.replace(FLOW_EXTENSION, FLOW_BINARY_EXTENSION);
        let flow_dir = parent(relative_flow_path);
        Self {
            flow_path: solution_path.to_string(),
            binary_type: SINGLE_FLOW.to_string(),
            flow_project_root: join_remote([solution_path, flow_dir]),
            predefined_binary_path: join_remote([solution_path, binary_rel.as_str()]),
            settings: CompileSettings {
                flow_file: file_name(relative_flow_path).to_string(),
                is_flow_v3: true,
            },
        }
    }

    /// Compile request for a solution builder flow; the binary goes to the
    /// flow version's `builds/{version}.ibflowbin`.
    pub fn for_solution_builder(flow_path: &str, version: &ArtifactVersion) -> Result<Self> {
        let parts: Vec<&str> = flow_path.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() <= SOLUTION_BUILDER_ROOT_DEPTH {
            return Err(PromoteError::Format(format!(
                "solution builder flow path '{flow_path}' is too short"
            )));
        }
        let binary_name = format!("{version}{FLOW_BINARY_EXTENSION}");
        let mut binary_parts = parts[..parts.len() - 1].to_vec();
        binary_parts.push("builds");
        binary_parts.push(&binary_name);
        Ok(Self {
            flow_path: flow_path.to_string(),
            binary_type: SINGLE_FLOW.to_string(),
            flow_project_root: join_remote(&parts[..SOLUTION_BUILDER_ROOT_DEPTH]),
            predefined_binary_path: join_remote(binary_parts),
            settings: CompileSettings {
                flow_file: join_remote(&parts[SOLUTION_BUILDER_ROOT_DEPTH..]),
                is_flow_v3: true,
            },
        })
    }
}

/// Compile the flow, wait for its binary (best effort), then package the
/// source tree into `output_folder`.
pub async fn compile_and_package<I>(
    api: &I,
    source_tree_root: &str,
    flow_relative_path: &str,
    output_folder: &str,
    timings: &Timings,
) -> Result<(serde_json::Value, serde_json::Value)>
where
    I: RemoteFileAccess + SolutionApi + ?Sized,
{
    let request = CompileRequest::for_filesystem_flow(source_tree_root, flow_relative_path);
    info!(flow = %flow_relative_path, root = %source_tree_root, "Submitting compile");
    let compiled = api.compile(&request).await?;

    settle(api, &request.predefined_binary_path, timings).await?;

    info!(content_folder = %source_tree_root, output_folder, "Submitting package");
    let packaged = api.package(source_tree_root, output_folder).await?;
    Ok((compiled, packaged))
}

/// Path of the highest-versioned `.ibsolution` in `folder`, optionally only
/// among artifacts whose name contains `name_filter`.
pub async fn resolve_latest_artifact<F>(files: &F, folder: &str, name_filter: Option<&str>) -> Result<String>
where
    F: RemoteFileAccess + ?Sized,
{
    let listed = files.list(folder).await?;
    let mut candidates = Vec::new();
    for path in listed.into_iter().filter(|p| p.ends_with(SOLUTION_EXTENSION)) {
        let stem = file_stem(&path);
        if let Some(filter) = name_filter {
            if !stem.contains(filter) {
                continue;
            }
        }
        let version = extract_version(&path).to_string();
        if ArtifactVersion::parse(&version).is_err() {
            warn!(path = %path, "Skipping artifact without a parseable version suffix");
            continue;
        }
        candidates.push((path, version));
    }

    let latest = pick_latest(candidates)?;
    match latest.name {
        Some(path) => {
            info!(folder, path = %path, version = %latest.version, "Resolved latest artifact");
            Ok(path)
        }
        None => {
            error!(folder, filter = ?name_filter, "No matching .ibsolution artifacts");
            Err(PromoteError::NotFound(format!(
                "no .ibsolution artifacts in {folder}{}",
                name_filter.map(|f| format!(" matching '{f}'")).unwrap_or_default()
            )))
        }
    }
}

/// Copy a filesystem solution (package.json, icon, flow and its modules) into
/// `working_dir`, keeping its layout. Returns the staged solution folder.
pub async fn stage_solution<F>(
    files: &F,
    solution_dir: &str,
    working_dir: &str,
    relative_flow_path: &str,
) -> Result<String>
where
    F: RemoteFileAccess + ?Sized,
{
    let staged_root = join_remote([working_dir, file_name(solution_dir)]);
    let relative = [
        "package.json".to_string(),
        "icon.png".to_string(),
        relative_flow_path.to_string(),
        join_remote([parent(relative_flow_path), "modules"]),
    ];
    for rel in &relative {
        let src = join_remote([solution_dir, rel.as_str()]);
        let dst = join_remote([staged_root.as_str(), rel.as_str()]);
        info!(src = %src, dst = %dst, "Staging solution file");
        files.copy(&src, &dst).await?;
    }
    Ok(staged_root)
}

/// Highest bare-version build in `builds_dir` (`4.0.30.ibflowbin` -> 4.0.30).
/// A missing or unreadable folder counts as no builds yet.
pub async fn latest_flow_version<F>(files: &F, builds_dir: &str) -> ArtifactVersion
where
    F: RemoteFileAccess + ?Sized,
{
    let listed = match files.list(builds_dir).await {
        Ok(paths) => paths,
        Err(e) => {
            warn!(builds_dir, error = %e, "Could not list builds, starting from 0.0.0");
            return ArtifactVersion::ZERO;
        }
    };
    listed
        .iter()
        .map(|p| file_stem(p))
        .filter(|stem| is_version_stem(stem))
        .filter_map(|stem| ArtifactVersion::parse(stem).ok())
        .max()
        .unwrap_or(ArtifactVersion::ZERO)
}

#[derive(Debug, Deserialize)]
struct FlowMetadata {
    name: String,
}

/// Path of the first version folder of the solution builder flow named `flow_name`.
pub async fn find_solution_builder_flow<F>(
    files: &F,
    workspace_root: &str,
    project_name: &str,
    flow_name: &str,
) -> Result<String>
where
    F: RemoteFileAccess + ?Sized,
{
    let flows_dir = join_remote([workspace_root, ".instabase_projects", project_name, "latest", "flows"]);
    for flow_dir in files.list(&flows_dir).await? {
        let raw = files.read(&join_remote([flow_dir.as_str(), "metadata.json"])).await?;
        let metadata: FlowMetadata = serde_json::from_slice(&raw)?;
        if metadata.name != flow_name {
            continue;
        }
        let versions = files.list(&join_remote([flow_dir.as_str(), "versions"])).await?;
        return versions.into_iter().next().ok_or_else(|| {
            PromoteError::NotFound(format!("flow '{flow_name}' in {flow_dir} has no versions"))
        });
    }
    Err(PromoteError::NotFound(format!(
        "flow '{flow_name}' not found in {flows_dir}"
    )))
}

/// Inputs of one solution builder release.
#[derive(Debug, Clone)]
pub struct SolutionBuilderRelease {
    pub workspace_root: String,
    pub project_name: String,
    pub flow_name: String,
    /// Folder the finished `.ibsolution` is copied to.
    pub working_dir: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleasedSolution {
    pub version: ArtifactVersion,
    pub artifact_path: String,
}

/// Compile the next patch version of a solution builder flow and package it
/// together with `icon` and a generated `package.json`.
pub async fn release_solution_builder_flow<I>(
    api: &I,
    release: &SolutionBuilderRelease,
    icon: Vec<u8>,
    timings: &Timings,
) -> Result<ReleasedSolution>
where
    I: RemoteFileAccess + SolutionApi + ?Sized,
{
    let flow_folder =
        find_solution_builder_flow(api, &release.workspace_root, &release.project_name, &release.flow_name)
            .await?;
    let flow_path = join_remote([flow_folder.as_str(), "flow.ibflow"]);
    let builds_dir = join_remote([parent(&flow_path), "builds"]);

    let version = latest_flow_version(api, &builds_dir).await.next_patch()?;
    info!(flow = %release.flow_name, version = %version, "Releasing solution builder flow");

    let request = CompileRequest::for_solution_builder(&flow_path, &version)?;
    api.compile(&request).await?;

    let release_folder = format!("{}-{version}", release.project_name);
    let solutions_dir = join_remote([builds_dir.as_str(), "solutions", release_folder.as_str()]);
    api.put(&join_remote([solutions_dir.as_str(), "icon.png"]), icon).await?;
    let package = SolutionPackage::for_flow_release(&release.project_name, &release.flow_name, &version);
    api.put(&join_remote([solutions_dir.as_str(), "package.json"]), package.to_bytes()?)
        .await?;

    settle(api, &request.predefined_binary_path, timings).await?;
    let binary_name = format!("{version}{FLOW_BINARY_EXTENSION}");
    let staged_binary = join_remote([solutions_dir.as_str(), binary_name.as_str()]);
    api.copy(&request.predefined_binary_path, &staged_binary).await?;
    settle(api, &staged_binary, timings).await?;

    api.package(&solutions_dir, &solutions_dir).await?;

    let artifact_name = artifact_file_name(&release.project_name, version);
    let packaged = join_remote([solutions_dir.as_str(), artifact_name.as_str()]);
    settle(api, &packaged, timings).await?;

    let artifact_path = join_remote([release.working_dir.as_str(), artifact_name.as_str()]);
    api.copy(&packaged, &artifact_path).await?;
    grace_delay(timings.settle_interval, "copy of packaged solution into working dir").await;

    info!(artifact = %artifact_path, version = %version, "Solution builder release packaged");
    Ok(ReleasedSolution {
        version,
        artifact_path,
    })
}
