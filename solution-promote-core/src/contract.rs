//! # contract: remote capabilities of one platform instance
//!
//! Everything the packager and the orchestrator need from a platform
//! instance is expressed by three traits:
//!
//! - [`RemoteFileAccess`]: the chunked file API (read, upload, copy, delete,
//!   existence probes, listing, remote unzip, folder creation).
//! - [`JobStatusApi`]: the job-status endpoint used by the poller.
//! - [`SolutionApi`]: compile, package, publish, deploy and marketplace copy.
//!
//! An [`Instance`] is anything implementing all three. Source and target are
//! two distinct instances; they never share state.
//!
//! ## Mocking & Testing
//! Each trait is annotated for `mockall`, and [`MockInstance`] implements all
//! three at once. Mocks are exported behind the default `test-export-mocks`
//! feature so downstream crates can use them in their own tests.

#![allow(unused)]

use async_trait::async_trait;
use mockall::{automock, mock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Size of one `PATCH` part when uploading in chunks (10 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// A metadata probe reporting more bytes than this counts as "present" for
/// [`RemoteFileAccess::probe_exists`]. Smaller files read as absent.
pub const EXISTENCE_SIZE_THRESHOLD: u64 = 100_000;

/// File operations against one `(host, token)` pair.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RemoteFileAccess: Send + Sync {
    /// Read a whole file. Fails with `RemoteNotFound` when the remote does not
    /// answer 200.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Upload in fixed-size parts. Not atomic: a failure part-way leaves a
    /// partial object at `path`.
    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Single-request upload for small files.
    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Submit a copy. Returns once the remote accepted it, not when it is done.
    async fn copy(&self, src: &str, dst: &str) -> Result<()>;

    /// Best effort: failures are logged by the implementation, never returned.
    async fn delete(&self, path: &str);

    /// True existence check: the metadata probe answered.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Best-effort existence probe: present only when the reported size is
    /// above [`EXISTENCE_SIZE_THRESHOLD`]. Genuinely small files read as absent.
    async fn probe_exists(&self, path: &str) -> Result<bool>;

    /// Full paths of the folder's children, following pagination to the end.
    async fn list(&self, folder: &str) -> Result<Vec<String>>;

    /// Submit a remote unzip of `zip_path` into `dst`.
    async fn extract(&self, zip_path: &str, dst: &str) -> Result<()>;

    /// Create `folder` unless it already exists.
    async fn create_folder(&self, folder: &str) -> Result<()>;
}

/// Job kinds understood by the job-status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Flow,
    Refiner,
    Job,
    Async,
    Group,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Flow => "flow",
            JobKind::Refiner => "refiner",
            JobKind::Job => "job",
            JobKind::Async => "async",
            JobKind::Group => "group",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw answer of the job-status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: String,
    #[serde(default)]
    pub state: String,
}

/// What a [`JobStatus`] means for the poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn new(status: impl Into<String>, state: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            state: state.into(),
        }
    }

    pub fn outcome(&self) -> JobOutcome {
        if self.status != "OK" {
            JobOutcome::Failed
        } else if self.state == "DONE" || self.state == "COMPLETE" {
            JobOutcome::Succeeded
        } else {
            JobOutcome::Running
        }
    }
}

#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait JobStatusApi: Send + Sync {
    /// One probe of the job-status endpoint. A status other than `OK` is
    /// returned, not raised; only transport failures are errors.
    async fn job_status(&self, job_id: &str, kind: JobKind) -> Result<JobStatus>;
}

/// Body of a compile request (`POST v1/flow_binary/compile/{path}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    /// Path the request URL is built from.
    #[serde(skip)]
    pub flow_path: String,
    pub binary_type: String,
    pub flow_project_root: String,
    pub predefined_binary_path: String,
    pub settings: CompileSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileSettings {
    pub flow_file: String,
    pub is_flow_v3: bool,
}

/// Solution lifecycle operations.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SolutionApi: Send + Sync {
    /// Submit a flow compile. Rejected submissions and bodies with an `ERROR`
    /// status are `RemoteWrite` errors.
    async fn compile(&self, request: &CompileRequest) -> Result<serde_json::Value>;

    /// Package `content_folder` into an `.ibsolution` inside `output_folder`.
    async fn package(&self, content_folder: &str, output_folder: &str) -> Result<serde_json::Value>;

    /// Publish an `.ibsolution` to this instance's marketplace.
    async fn publish(&self, ibsolution_path: &str) -> Result<serde_json::Value>;

    /// Deploy an `.ibsolution`; returns the deployment job id when reported.
    async fn deploy(&self, solution_path: &str) -> Result<Option<String>>;

    /// Ask the marketplace to copy `{name}-{version}.ibsolution` to `dst`;
    /// returns the id of the asynchronous copy job.
    async fn marketplace_copy(&self, name: &str, version: &str, dst: &str) -> Result<String>;
}

/// A platform instance: file access, job status and solution operations.
pub trait Instance: RemoteFileAccess + JobStatusApi + SolutionApi {}

impl<T> Instance for T where T: RemoteFileAccess + JobStatusApi + SolutionApi {}

#[cfg(any(test, feature = "test-export-mocks"))]
mock! {
    pub Instance {}

    #[async_trait]
    impl RemoteFileAccess for Instance {
        async fn read(&self, path: &str) -> Result<Vec<u8>>;
        async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()>;
        async fn put(&self, path: &str, data: Vec<u8>) -> Result<()>;
        async fn copy(&self, src: &str, dst: &str) -> Result<()>;
        async fn delete(&self, path: &str);
        async fn exists(&self, path: &str) -> Result<bool>;
        async fn probe_exists(&self, path: &str) -> Result<bool>;
        async fn list(&self, folder: &str) -> Result<Vec<String>>;
        async fn extract(&self, zip_path: &str, dst: &str) -> Result<()>;
        async fn create_folder(&self, folder: &str) -> Result<()>;
    }

    #[async_trait]
    impl JobStatusApi for Instance {
        async fn job_status(&self, job_id: &str, kind: JobKind) -> Result<JobStatus>;
    }

    #[async_trait]
    impl SolutionApi for Instance {
        async fn compile(&self, request: &CompileRequest) -> Result<serde_json::Value>;
        async fn package(&self, content_folder: &str, output_folder: &str) -> Result<serde_json::Value>;
        async fn publish(&self, ibsolution_path: &str) -> Result<serde_json::Value>;
        async fn deploy(&self, solution_path: &str) -> Result<Option<String>>;
        async fn marketplace_copy(&self, name: &str, version: &str, dst: &str) -> Result<String>;
    }
}
