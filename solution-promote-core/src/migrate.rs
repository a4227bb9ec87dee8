//! High-level pipeline: move one `.ibsolution` and its dependency closure
//! from a source instance to a target instance.
//!
//! The sequence of [`migrate_solution`]:
//!   1. resolve the latest artifact on the source;
//!   2. skip the upload when the target already has it (best-effort probe);
//!   3. otherwise read it from the source and upload it to the target;
//!   4. read its embedded `package.json` and parse the dependency manifest;
//!   5. copy every dependency from the source marketplace into the target,
//!      skipping failures;
//!   6. publish the migrated dependencies on the target marketplace.
//!
//! # Error Handling
//! Steps 1–4 are fail-fast. In step 5 a failing dependency is logged and
//! skipped, and in step 6 publish failures are logged only; both surface only
//! through the returned [`MigrationReport`].
//!
//! Every remote call is awaited before the next one is issued.

use sha2::{Digest, Sha256};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Timings;
use crate::contract::{Instance, JobKind, RemoteFileAccess, SolutionApi};
use crate::error::{PromoteError, Result};
use crate::manifest::{artifact_file_name, DependencyManifest, PackageJson};
use crate::packager::resolve_latest_artifact;
use crate::paths::{file_name, join_remote};
use crate::poller::{settle, wait_for_job};
use crate::version::ArtifactVersion;

const SOURCE_DEPENDENCIES_FOLDER: &str = "source_dependencies";
const TARGET_DEPENDENCIES_FOLDER: &str = "target_dependencies";

/// Locations for one migration run.
#[derive(Debug, Clone)]
pub struct MigrationPlan {
    /// Folder on the source holding versioned `.ibsolution` files.
    pub source_folder: String,
    /// Only consider artifacts whose name contains this.
    pub name_filter: Option<String>,
    /// Folder on the target the artifact is uploaded to.
    pub target_folder: String,
    /// Folder on the source for marketplace copies and manifest extraction.
    pub source_staging_folder: String,
    /// Folder on the target that receives dependency artifacts.
    pub target_dependencies_parent: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub source_artifact: String,
    pub target_artifact: String,
    /// False when the target already held the artifact.
    pub uploaded: bool,
    /// Hex SHA-256 of the uploaded bytes, when an upload happened.
    pub sha256: Option<String>,
    pub dependencies: Vec<String>,
    pub published: Vec<String>,
}

/// Result of moving a single artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyOutcome {
    AlreadyPresent(String),
    Uploaded(String),
}

impl DependencyOutcome {
    pub fn path(&self) -> &str {
        match self {
            DependencyOutcome::AlreadyPresent(p) | DependencyOutcome::Uploaded(p) => p,
        }
    }
}

/// Steps 1–6 (see module docs).
pub async fn migrate_solution<S, T>(source: &S, target: &T, plan: &MigrationPlan, timings: &Timings) -> Result<MigrationReport>
where
    S: Instance + ?Sized,
    T: Instance + ?Sized,
{
    info!(source_folder = %plan.source_folder, target_folder = %plan.target_folder, "Starting solution migration");

    let promoted = promote_latest(
        source,
        target,
        &plan.source_folder,
        &plan.target_folder,
        plan.name_filter.as_deref(),
    )
    .await?;

    let manifest = read_embedded_manifest(source, &promoted.source_artifact, &plan.source_staging_folder, timings).await?;
    info!(dependencies = manifest.len(), "Read dependency manifest from artifact");

    let dependencies = migrate_dependencies(
        source,
        target,
        &manifest,
        &plan.source_staging_folder,
        &plan.target_dependencies_parent,
        timings,
    )
    .await?;

    let published = publish_all(target, &dependencies).await;

    info!(
        artifact = %promoted.target_artifact,
        dependencies = dependencies.len(),
        published = published.len(),
        "Solution migration finished"
    );
    Ok(MigrationReport {
        source_artifact: promoted.source_artifact,
        target_artifact: promoted.target_artifact,
        uploaded: promoted.uploaded,
        sha256: promoted.sha256,
        dependencies,
        published,
    })
}

/// Outcome of [`promote_latest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub source_artifact: String,
    pub target_artifact: String,
    pub uploaded: bool,
    pub sha256: Option<String>,
}

/// Steps 1–3: copy the latest source artifact into `target_folder` unless the
/// target already reports it.
pub async fn promote_latest<S, T>(
    source: &S,
    target: &T,
    source_folder: &str,
    target_folder: &str,
    name_filter: Option<&str>,
) -> Result<Promotion>
where
    S: RemoteFileAccess + ?Sized,
    T: RemoteFileAccess + ?Sized,
{
    let source_artifact = resolve_latest_artifact(source, source_folder, name_filter).await?;
    let target_artifact = join_remote([target_folder, file_name(&source_artifact)]);

    if target.probe_exists(&target_artifact).await? {
        info!(path = %target_artifact, "Target already holds artifact, skipping upload");
        return Ok(Promotion {
            source_artifact,
            target_artifact,
            uploaded: false,
            sha256: None,
        });
    }

    let bytes = source.read(&source_artifact).await?;
    let digest = sha256_hex(&bytes);
    info!(src = %source_artifact, dst = %target_artifact, size = bytes.len(), sha256 = %digest, "Uploading artifact to target");
    target.upload(&target_artifact, bytes).await?;

    Ok(Promotion {
        source_artifact,
        target_artifact,
        uploaded: true,
        sha256: Some(digest),
    })
}

/// Read the `package.json` inside an `.ibsolution` by copying it to a staging
/// `.zip`, unzipping remotely, and reading the extracted manifest. Staging
/// objects are removed afterwards (best effort).
pub async fn read_embedded_manifest<F>(
    files: &F,
    artifact_path: &str,
    staging_folder: &str,
    timings: &Timings,
) -> Result<DependencyManifest>
where
    F: RemoteFileAccess + ?Sized,
{
    let package = read_embedded_package(files, artifact_path, staging_folder, timings).await?;
    DependencyManifest::from_package_json(&package)
}

/// Like [`read_embedded_manifest`] but returns the whole `package.json`.
pub async fn read_embedded_package<F>(
    files: &F,
    artifact_path: &str,
    staging_folder: &str,
    timings: &Timings,
) -> Result<PackageJson>
where
    F: RemoteFileAccess + ?Sized,
{
    let staging_name = format!("manifest_{}", Uuid::new_v4().simple());
    let zip_name = format!("{staging_name}.zip");
    let zip_path = join_remote([staging_folder, zip_name.as_str()]);
    let extract_dir = join_remote([staging_folder, staging_name.as_str()]);
    let package_json = join_remote([extract_dir.as_str(), "package.json"]);

    info!(artifact = %artifact_path, staging = %extract_dir, "Extracting embedded package.json");
    files.copy(artifact_path, &zip_path).await?;
    settle(files, &zip_path, timings).await?;
    files.extract(&zip_path, &extract_dir).await?;
    settle(files, &package_json, timings).await?;

    let read = files.read(&package_json).await;

    files.delete(&zip_path).await;
    files.delete(&extract_dir).await;

    PackageJson::from_slice(&read?)
}

/// Move one marketplace package into `target_upload_folder`. Skips all work
/// when the target already reports the artifact.
pub async fn migrate_dependency<S, T>(
    source: &S,
    target: &T,
    name: &str,
    version: &ArtifactVersion,
    source_download_folder: &str,
    target_upload_folder: &str,
    timings: &Timings,
) -> Result<DependencyOutcome>
where
    S: Instance + ?Sized,
    T: RemoteFileAccess + ?Sized,
{
    let solution_name = artifact_file_name(name, version);
    let final_path = join_remote([target_upload_folder, solution_name.as_str()]);
    if target.probe_exists(&final_path).await? {
        info!(package = name, version = %version, path = %final_path, "Dependency already on target");
        return Ok(DependencyOutcome::AlreadyPresent(final_path));
    }

    let staged = join_remote([source_download_folder, solution_name.as_str()]);
    if !source.probe_exists(&staged).await? {
        copy_from_marketplace(source, name, version, &staged, timings).await?;
    }

    let bytes = source.read(&staged).await?;
    info!(package = name, version = %version, dst = %final_path, size = bytes.len(), "Uploading dependency to target");
    target.upload(&final_path, bytes).await?;
    Ok(DependencyOutcome::Uploaded(final_path))
}

/// Ask the source marketplace to copy a package to `dst` and wait for the job.
pub async fn copy_from_marketplace<S>(
    source: &S,
    name: &str,
    version: &ArtifactVersion,
    dst: &str,
    timings: &Timings,
) -> Result<()>
where
    S: Instance + ?Sized,
{
    let version = version.to_string();
    let job_id = source.marketplace_copy(name, &version, dst).await?;
    if wait_for_job(source, &job_id, JobKind::Job, timings.poll_interval).await? {
        Ok(())
    } else {
        Err(PromoteError::remote_write(
            "marketplace copy",
            dst,
            format!("job {job_id} for {name}=={version} did not succeed"),
        ))
    }
}

/// Migrate every dependency in order. A failing dependency is logged and
/// skipped; the returned paths are those now present on the target.
pub async fn migrate_dependencies<S, T>(
    source: &S,
    target: &T,
    manifest: &DependencyManifest,
    source_download_parent: &str,
    target_upload_parent: &str,
    timings: &Timings,
) -> Result<Vec<String>>
where
    S: Instance + ?Sized,
    T: RemoteFileAccess + ?Sized,
{
    let source_folder = join_remote([source_download_parent, SOURCE_DEPENDENCIES_FOLDER]);
    let target_folder = join_remote([target_upload_parent, TARGET_DEPENDENCIES_FOLDER]);
    source.create_folder(&source_folder).await?;
    target.create_folder(&target_folder).await?;

    let mut paths = Vec::new();
    for (name, version) in manifest.iter() {
        match migrate_dependency(source, target, name, version, &source_folder, &target_folder, timings).await {
            Ok(outcome) => paths.push(outcome.path().to_string()),
            Err(e) => {
                error!(package = name, version = %version, error = %e, "Error moving package, skipping");
            }
        }
    }
    if paths.len() < manifest.len() {
        warn!(
            migrated = paths.len(),
            requested = manifest.len(),
            "Some dependencies were not migrated"
        );
    }
    Ok(paths)
}

/// Publish each artifact; failures are logged. Returns the published paths.
pub async fn publish_all<A>(api: &A, paths: &[String]) -> Vec<String>
where
    A: SolutionApi + ?Sized,
{
    let mut published = Vec::new();
    for path in paths {
        match api.publish(path).await {
            Ok(resp) => {
                info!(path = %path, response = %resp, "Published to marketplace");
                published.push(path.clone());
            }
            Err(e) => {
                error!(path = %path, error = %e, "Error publishing to marketplace");
            }
        }
    }
    published
}

/// Resolve the latest artifact in `folder` and deploy it.
pub async fn deploy_latest<I>(api: &I, folder: &str, name_filter: Option<&str>) -> Result<(String, Option<String>)>
where
    I: RemoteFileAccess + SolutionApi + ?Sized,
{
    let path = resolve_latest_artifact(api, folder, name_filter).await?;
    let job_id = api.deploy(&path).await?;
    match &job_id {
        Some(id) => info!(path = %path, job_id = %id, "Solution deployed"),
        None => warn!(path = %path, "Deploy accepted without a job id"),
    }
    Ok((path, job_id))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_lowercase_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn outcome_path() {
        assert_eq!(DependencyOutcome::AlreadyPresent("a".into()).path(), "a");
        assert_eq!(DependencyOutcome::Uploaded("b".into()).path(), "b");
    }
}
