#![doc = "Direct HTTP client for one platform instance: implements the core remote traits over reqwest."]
//
//! # Instance client
//!
//! [`HttpInstance`] wires the [`RemoteFileAccess`], [`JobStatusApi`] and
//! [`SolutionApi`] traits from `solution-promote-core` to the platform's HTTP
//! API on one `(host, token)` pair. Every request carries
//! `Authorization: Bearer {token}`.
//!
//! URLs are built segment by segment, so remote paths containing spaces or
//! other reserved characters are percent-encoded per segment and slashes stay
//! path separators.
//!
//! Endpoints used (relative to `{host}/api`):
//! - `v2/files/{path}`: GET read/list, PATCH chunked upload, PUT, HEAD, DELETE, POST create folder
//! - `v2/files/copy`, `v2/files/extract`
//! - `v1/flow_binary/compile/{path}`, `v1/solution/create`, `v1/marketplace/publish`
//! - `v1/solutions/deployed`, `v1/jobs/status`
//! - `v1/drives/.../Marketplace/All/{name}/{version}/{file}/copy?is_v2=true`

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use solution_promote_core::config::InstanceConfig;
use solution_promote_core::contract::{
    CompileRequest, JobKind, JobStatus, JobStatusApi, RemoteFileAccess, SolutionApi, DEFAULT_CHUNK_SIZE,
    EXISTENCE_SIZE_THRESHOLD,
};
use solution_promote_core::error::{PromoteError, Result};
use solution_promote_core::manifest::artifact_file_name;
use solution_promote_core::paths::{file_name, parent};

const IB_CURSOR: &str = "IB-Cursor";
const IB_RETRY_CONFIG: &str = "IB-Retry-Config";
const METADATA_RETRY_CONFIG: &str = r#"{"retries": 2, "backoff-seconds": 1}"#;
const MARKETPLACE_ROOT: &str = "drives/system/global/fs/Instabase Drive/Applications/Marketplace/All";

pub struct HttpInstance {
    config: InstanceConfig,
    http: Client,
    chunk_size: usize,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    nodes: Vec<ListNode>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListNode {
    full_path: String,
}

#[derive(Serialize)]
struct CopyBody<'a> {
    src_path: &'a str,
    dst_path: &'a str,
}

impl HttpInstance {
    pub fn new(config: InstanceConfig) -> Self {
        info!(host = %config.host, token_set = !config.token.is_empty(), "Initialized HttpInstance");
        Self {
            config,
            http: Client::new(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Part size for [`RemoteFileAccess::upload`]. Zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// `{host}/api/{version}/{fixed...}/{remote path segments...}`
    fn api_url(&self, version: &str, fixed: &[&str], remote_path: &str) -> Result<Url> {
        let mut url = Url::parse(&self.config.host)
            .map_err(|e| PromoteError::Format(format!("invalid host '{}': {e}", self.config.host)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PromoteError::Format(format!("host '{}' cannot carry a path", self.config.host)))?;
            segments.pop_if_empty();
            segments.push("api").push(version);
            segments.extend(fixed.iter().flat_map(|f| f.split('/')));
            segments.extend(remote_path.split('/').filter(|s| !s.is_empty()));
        }
        Ok(url)
    }

    fn files_url(&self, remote_path: &str) -> Result<Url> {
        self.api_url("v2", &["files"], remote_path)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.config.token)
    }

    fn not_found(&self, path: &str, status: StatusCode) -> PromoteError {
        PromoteError::RemoteNotFound {
            path: path.to_string(),
            host: self.config.host.clone(),
            status: status.as_u16(),
        }
    }

    async fn metadata(&self, path: &str) -> Result<Response> {
        let url = self.files_url(path)?;
        let resp = self
            .authed(self.http.head(url))
            .header(IB_RETRY_CONFIG, METADATA_RETRY_CONFIG)
            .send()
            .await?;
        debug!(path, status = %resp.status(), "Metadata probe");
        Ok(resp)
    }

    /// Fails with `RemoteWrite` unless the answer has exactly `expected` status.
    async fn expect_status(
        &self,
        resp: Response,
        expected: StatusCode,
        operation: &'static str,
        path: &str,
    ) -> Result<()> {
        let status = resp.status();
        if status == expected {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        error!(host = %self.config.host, path, operation, %status, body = %body, "Remote rejected request");
        Err(PromoteError::remote_write(operation, path, format!("{status}: {body}")))
    }

    /// POST a JSON body and return the JSON answer. Non-2xx answers and bodies
    /// reporting `"status": "ERROR"` are `RemoteWrite` errors.
    async fn post_json<B>(&self, operation: &'static str, subject: &str, url: Url, body: &B) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let resp = self.authed(self.http.post(url)).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let value = if text.trim().is_empty() {
            Value::Null
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(v) => v,
                Err(_) => Value::String(text),
            }
        };
        if !status.is_success() || reports_error(&value) {
            error!(host = %self.config.host, subject, operation, %status, response = %value, "Remote operation failed");
            return Err(PromoteError::remote_write(operation, subject, format!("{status}: {value}")));
        }
        Ok(value)
    }
}

fn reports_error(value: &Value) -> bool {
    value.get("status").and_then(Value::as_str) == Some("ERROR")
}

/// Parses the `Content-Length` of a metadata answer.
pub fn content_length(path: &str, headers: &HeaderMap) -> Result<u64> {
    let raw = headers.get(CONTENT_LENGTH).ok_or_else(|| PromoteError::MetadataParse {
        path: path.to_string(),
        detail: "missing Content-Length header".to_string(),
    })?;
    raw.to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .ok_or_else(|| PromoteError::MetadataParse {
            path: path.to_string(),
            detail: format!("Content-Length {raw:?} is not an integer"),
        })
}

#[async_trait]
impl RemoteFileAccess for HttpInstance {
    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        let url = self.files_url(path)?;
        info!(host = %self.config.host, path, "Reading remote file");
        let resp = self
            .authed(self.http.get(url))
            .query(&[("expect-node-type", "file")])
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK {
            error!(host = %self.config.host, path, %status, "Error reading file");
            return Err(self.not_found(path, status));
        }
        Ok(resp.bytes().await?.to_vec())
    }

    async fn upload(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let url = self.files_url(path)?;
        let parts: Vec<&[u8]> = if data.is_empty() {
            vec![&data[..]]
        } else {
            data.chunks(self.chunk_size).collect()
        };
        let total = parts.len();
        info!(host = %self.config.host, path, size = data.len(), parts = total, "Uploading file in parts");

        for (index, part) in parts.into_iter().enumerate() {
            let cursor = if index == 0 { "0" } else { "-1" };
            let resp = self
                .authed(self.http.patch(url.clone()))
                .header(IB_CURSOR, cursor)
                .body(part.to_vec())
                .send()
                .await?;
            let status = resp.status();
            if status != StatusCode::NO_CONTENT {
                let body = resp.text().await.unwrap_or_default();
                error!(host = %self.config.host, path, part = index + 1, total, %status, "Upload part rejected");
                return Err(PromoteError::remote_write(
                    "upload",
                    path,
                    format!("part {}/{total} answered {status}: {body}", index + 1),
                ));
            }
            debug!(path, part = index + 1, total, "Uploaded part");
        }
        Ok(())
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> Result<()> {
        let url = self.files_url(path)?;
        info!(host = %self.config.host, path, size = data.len(), "Uploading file");
        let resp = self.authed(self.http.put(url)).body(data).send().await?;
        self.expect_status(resp, StatusCode::NO_CONTENT, "put", path).await
    }

    async fn copy(&self, src: &str, dst: &str) -> Result<()> {
        let url = self.files_url("copy")?;
        info!(host = %self.config.host, src, dst, "Submitting copy");
        let resp = self
            .authed(self.http.post(url))
            .json(&CopyBody {
                src_path: src,
                dst_path: dst,
            })
            .send()
            .await?;
        self.expect_status(resp, StatusCode::ACCEPTED, "copy", dst).await
    }

    async fn delete(&self, path: &str) {
        let url = match self.files_url(path) {
            Ok(url) => url,
            Err(e) => {
                warn!(path, error = %e, "Skipping delete");
                return;
            }
        };
        match self.authed(self.http.delete(url)).send().await {
            Ok(resp) if resp.status().is_success() => info!(host = %self.config.host, path, "Deleted"),
            Ok(resp) => warn!(host = %self.config.host, path, status = %resp.status(), "Delete not accepted"),
            Err(e) => warn!(host = %self.config.host, path, error = %e, "Delete failed"),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.metadata(path).await?.status() == StatusCode::OK)
    }

    async fn probe_exists(&self, path: &str) -> Result<bool> {
        let resp = self.metadata(path).await?;
        if resp.status() != StatusCode::OK {
            return Ok(false);
        }
        let size = content_length(path, resp.headers())?;
        Ok(size > EXISTENCE_SIZE_THRESHOLD)
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>> {
        let url = self.files_url(folder)?;
        let mut paths = Vec::new();
        let mut start_token: Option<String> = None;
        loop {
            let mut request = self
                .authed(self.http.get(url.clone()))
                .query(&[("expect-node-type", "folder")]);
            if let Some(token) = &start_token {
                request = request.query(&[("start-token", token.as_str())]);
            }
            let resp = request.send().await?;
            let status = resp.status();
            if status != StatusCode::OK {
                error!(host = %self.config.host, folder, %status, "Error listing folder");
                return Err(self.not_found(folder, status));
            }
            let page: ListPage = resp.json().await?;
            if page.status.as_deref() == Some("ERROR") {
                return Err(PromoteError::remote_write("list", folder, "listing reported status ERROR"));
            }
            paths.extend(page.nodes.into_iter().map(|n| n.full_path));
            if !page.has_more {
                break;
            }
            match page.next_page_token {
                Some(token) => start_token = Some(token),
                None => {
                    warn!(folder, "Listing reports more pages but no page token, stopping");
                    break;
                }
            }
        }
        debug!(folder, count = paths.len(), "Listed folder");
        Ok(paths)
    }

    async fn extract(&self, zip_path: &str, dst: &str) -> Result<()> {
        let url = self.files_url("extract")?;
        info!(host = %self.config.host, zip_path, dst, "Submitting extract");
        let resp = self
            .authed(self.http.post(url))
            .json(&CopyBody {
                src_path: zip_path,
                dst_path: dst,
            })
            .send()
            .await?;
        self.expect_status(resp, StatusCode::ACCEPTED, "extract", zip_path).await
    }

    async fn create_folder(&self, folder: &str) -> Result<()> {
        let probe = self.authed(self.http.head(self.files_url(folder)?)).send().await?;
        if probe.status() != StatusCode::NOT_FOUND {
            debug!(folder, status = %probe.status(), "Folder present, not creating");
            return Ok(());
        }
        info!(host = %self.config.host, folder, "Creating folder");
        let url = self.files_url(parent(folder))?;
        let resp = self
            .authed(self.http.post(url))
            .json(&json!({"name": file_name(folder), "node_type": "folder"}))
            .send()
            .await?;
        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(PromoteError::remote_write("create folder", folder, format!("{status}: {body}")))
        }
    }
}

#[async_trait]
impl JobStatusApi for HttpInstance {
    async fn job_status(&self, job_id: &str, kind: JobKind) -> Result<JobStatus> {
        let url = self.api_url("v1", &["jobs", "status"], "")?;
        let resp = self
            .authed(self.http.get(url))
            .query(&[("job_id", job_id), ("type", kind.as_str())])
            .send()
            .await?;
        let status = resp.status();
        if status != StatusCode::OK {
            error!(host = %self.config.host, job_id, %status, "Job status request failed");
            return Err(self.not_found(job_id, status));
        }
        let job: JobStatus = resp.json().await?;
        debug!(job_id, status = %job.status, state = %job.state, "Job status");
        Ok(job)
    }
}

#[async_trait]
impl SolutionApi for HttpInstance {
    async fn compile(&self, request: &CompileRequest) -> Result<Value> {
        let url = self.api_url("v1", &["flow_binary", "compile"], &request.flow_path)?;
        info!(host = %self.config.host, flow = %request.flow_path, binary = %request.predefined_binary_path, "Compiling flow");
        self.post_json("compile", &request.flow_path, url, request).await
    }

    async fn package(&self, content_folder: &str, output_folder: &str) -> Result<Value> {
        let url = self.api_url("v1", &["solution", "create"], "")?;
        info!(host = %self.config.host, content_folder, output_folder, "Packaging solution");
        let body = json!({"content_folder": content_folder, "output_folder": output_folder});
        self.post_json("package", content_folder, url, &body).await
    }

    async fn publish(&self, ibsolution_path: &str) -> Result<Value> {
        let url = self.api_url("v1", &["marketplace", "publish"], "")?;
        info!(host = %self.config.host, ibsolution_path, "Publishing to marketplace");
        let body = json!({"ibsolution_path": ibsolution_path});
        self.post_json("publish", ibsolution_path, url, &body).await
    }

    async fn deploy(&self, solution_path: &str) -> Result<Option<String>> {
        let url = self.api_url("v1", &["solutions", "deployed"], "")?;
        info!(host = %self.config.host, solution_path, "Deploying solution");
        let body = json!({"solution_path": solution_path});
        let value = self.post_json("deploy", solution_path, url, &body).await?;
        Ok(value.get("job_id").and_then(Value::as_str).map(str::to_string))
    }

    async fn marketplace_copy(&self, name: &str, version: &str, dst: &str) -> Result<String> {
        let solution = artifact_file_name(name, version);
        let mut url = self.api_url("v1", &[MARKETPLACE_ROOT, name, version, solution.as_str(), "copy"], "")?;
        url.query_pairs_mut().append_pair("is_v2", "true");
        info!(host = %self.config.host, package = name, version, dst, "Copying package from marketplace");
        let body = json!({"new_full_path": dst});
        let value = self.post_json("marketplace copy", dst, url, &body).await?;
        value
            .get("job_id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| PromoteError::remote_write("marketplace copy", dst, format!("no job_id in {value}")))
    }
}
