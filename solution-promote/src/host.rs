//! File access through a client object handed in by the hosting platform,
//! for code that runs inside the platform rather than against its HTTP API.
//!
//! [`HostFileAccess`] adapts any [`HostFiles`] to the core
//! [`RemoteFileAccess`] trait, so the packager and orchestrator run unchanged
//! on either path. The host offers no size metadata; both existence checks
//! map to `is_file`.

use async_trait::async_trait;
use tracing::{info, warn};

use solution_promote_core::contract::RemoteFileAccess;
use solution_promote_core::error::{PromoteError, Result};

/// The file operations a host-provided client exposes.
#[async_trait]
pub trait HostFiles: Send + Sync {
    async fn is_file(&self, path: &str) -> Result<bool>;
    async fn read_file(&self, path: &str) -> Result<Vec<u8>>;
    async fn write_file(&self, path: &str, data: Vec<u8>) -> Result<()>;
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;
    async fn rm(&self, path: &str) -> Result<()>;
    async fn list_dir(&self, path: &str) -> Result<Vec<String>>;
    async fn extract_zip(&self, zip_path: &str, dst: &str) -> Result<()>;
    async fn mkdir(&self, path: &str) -> Result<()>;
}

pub struct HostFileAccess<H> {
    host: String,
    files: H,
}

impl<H: HostFiles> HostFileAccess<H> {
    /// `host` labels the environment in errors and logs.
    pub fn new(host: impl Into<String>, files: H) -> Self {
        Self {
            host: host.into(),
            files,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn into_inner(self) -> H {
        self.files
    }
}

#[async_trait]
impl<H: HostFiles> RemoteFileAccess for HostFileAccess<H> {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        if !self.files.is_file(path).await? {
            warn!(host = %self.host, path, "Not a valid file on host");
            return Err(PromoteError::RemoteNotFound {
                path: path.to_string(),
                host: self.host.clone(),
                status: 404,
            });
        }
        self.files.read_file(path).await
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        info!(host = %self.host, path, size = data.len(), "Writing file through host client");
        self.files.write_file(path, data).await
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.files.write_file(path, data).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        self.files.copy(src, dst).await
    }

    async fn delete(&self, path: &str) {
        if let Err(e) = self.files.rm(path).await {
            warn!(host = %self.host, path, error = %e, "Host delete failed");
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        self.files.is_file(path).await
    }

    async fn probe_exists(&self, path: &str) -> Result<bool> {
        self.files.is_file(path).await
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>> {
        self.files.list_dir(folder).await
    }

    async fn extract(&self, zip_path: &str, dst: &str) -> Result<()> {
        self.files.extract_zip(zip_path, dst).await
    }

    async fn create_folder(&self, folder: &str) -> Result<()> {
        self.files.mkdir(folder).await
    }
}
