use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use solution_promote::host::{HostFileAccess, HostFiles};
use solution_promote_core::config::Timings;
use solution_promote_core::contract::{MockInstance, RemoteFileAccess};
use solution_promote_core::error::{PromoteError, Result};
use solution_promote_core::migrate::{migrate_dependency, DependencyOutcome};
use solution_promote_core::packager::resolve_latest_artifact;
use solution_promote_core::version::ArtifactVersion;

/// Host client backed by a map of path -> bytes.
#[derive(Default)]
struct MemoryHost {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    fail_rm: bool,
}

impl MemoryHost {
    fn with(paths: &[(&str, &str)]) -> Self {
        let host = MemoryHost::default();
        {
            let mut files = host.files.lock().unwrap();
            for (path, data) in paths {
                files.insert(path.to_string(), data.as_bytes().to_vec());
            }
        }
        host
    }
}

#[async_trait]
impl HostFiles for MemoryHost {
    async fn is_file(&self, path: &str) -> Result<bool> {
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Ok(self.files.lock().unwrap().get(path).cloned().unwrap_or_default())
    }

    async fn write_file(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.files.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        let data = files.get(src).cloned().unwrap_or_default();
        files.insert(dst.to_string(), data);
        Ok(())
    }

    async fn rm(&self, path: &str) -> Result<()> {
        if self.fail_rm {
            return Err(PromoteError::remote_write("rm", path, "read-only drive"));
        }
        self.files.lock().unwrap().remove(path);
        Ok(())
    }

    async fn list_dir(&self, path: &str) -> Result<Vec<String>> {
        let prefix = format!("{path}/");
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&prefix))
            .cloned()
            .collect())
    }

    async fn extract_zip(&self, _zip_path: &str, _dst: &str) -> Result<()> {
        Ok(())
    }

    async fn mkdir(&self, _path: &str) -> Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn resolves_latest_through_host_client() {
    let files = HostFileAccess::new("dev-host", MemoryHost::with(&[
        ("ws/out/app-0.9.0.ibsolution", "old"),
        ("ws/out/app-0.10.0.ibsolution", "new"),
    ]));

    let latest = resolve_latest_artifact(&files, "ws/out", Some("app")).await.unwrap();
    assert_eq!(latest, "ws/out/app-0.10.0.ibsolution");
    assert_eq!(files.read(&latest).await.unwrap(), b"new");
}

#[tokio::test]
async fn reading_a_missing_file_is_not_found() {
    let files = HostFileAccess::new("dev-host", MemoryHost::default());
    let err = files.read("ws/none.json").await.unwrap_err();
    match err {
        PromoteError::RemoteNotFound { path, host, status } => {
            assert_eq!(path, "ws/none.json");
            assert_eq!(host, "dev-host");
            assert_eq!(status, 404);
        }
        other => panic!("expected RemoteNotFound, got {other:?}"),
    }
}

#[tokio::test]
async fn both_existence_checks_use_is_file() {
    let files = HostFileAccess::new("dev-host", MemoryHost::with(&[("ws/tiny.txt", "x")]));
    assert!(files.exists("ws/tiny.txt").await.unwrap());
    assert!(files.probe_exists("ws/tiny.txt").await.unwrap());
    assert!(!files.probe_exists("ws/other.txt").await.unwrap());
}

#[tokio::test]
async fn delete_failures_are_swallowed() {
    let host = MemoryHost {
        fail_rm: true,
        ..MemoryHost::with(&[("ws/keep.txt", "x")])
    };
    let files = HostFileAccess::new("dev-host", host);
    files.delete("ws/keep.txt").await;
    assert!(files.exists("ws/keep.txt").await.unwrap());
}

#[tokio::test]
async fn dependency_lands_on_host_target() {
    let mut source = MockInstance::new();
    source.expect_probe_exists().returning(|_| Ok(true));
    source.expect_marketplace_copy().never();
    source
        .expect_read()
        .withf(|path| path == "src/dl/pkgA-1.0.0.ibsolution")
        .returning(|_| Ok(b"archive".to_vec()));

    let target = HostFileAccess::new("dev-host", MemoryHost::default());
    let outcome = migrate_dependency(
        &source,
        &target,
        "pkgA",
        &ArtifactVersion::new(1, 0, 0),
        "src/dl",
        "tgt/deps",
        &Timings::immediate(),
    )
    .await
    .unwrap();

    assert_eq!(
        outcome,
        DependencyOutcome::Uploaded("tgt/deps/pkgA-1.0.0.ibsolution".to_string())
    );
    let host = target.into_inner();
    assert_eq!(
        host.files.lock().unwrap().get("tgt/deps/pkgA-1.0.0.ibsolution"),
        Some(&b"archive".to_vec())
    );
}
