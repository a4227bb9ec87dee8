//! Error taxonomy shared by every component of the promotion toolkit.
//!
//! Most failures abort the run. The orchestrator is the only place that
//! catches errors on purpose (per-dependency migration and publishing).

use thiserror::Error;

/// Errors raised by parsing, remote access, packaging and migration.
#[derive(Debug, Error)]
pub enum PromoteError {
    /// A version string or dependency entry is malformed.
    #[error("Format error: {0}")]
    Format(String),

    /// A read or probe hit a path the remote does not serve.
    #[error("Remote path '{path}' not found on {host} (status {status})")]
    RemoteNotFound {
        path: String,
        host: String,
        status: u16,
    },

    /// An upload, copy, compile, package or publish was rejected by the remote,
    /// or accepted with an internal error status in the body.
    #[error("Remote {operation} rejected for '{path}': {detail}")]
    RemoteWrite {
        operation: &'static str,
        path: String,
        detail: String,
    },

    /// A selection filter matched no artifact.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A metadata probe answered 200 but its Content-Length was unusable.
    #[error("Malformed metadata for '{path}': {detail}")]
    MetadataParse { path: String, detail: String },

    /// A step needs a configuration value that was not provided.
    #[error("Missing configuration value {0}")]
    MissingConfig(&'static str),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl PromoteError {
    pub fn remote_write(
        operation: &'static str,
        path: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        PromoteError::RemoteWrite {
            operation,
            path: path.into(),
            detail: detail.into(),
        }
    }
}

pub type Result<T, E = PromoteError> = std::result::Result<T, E>;
