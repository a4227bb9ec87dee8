#![doc = "solution-promote-core: core logic for promoting ibsolution artifacts."]

//! Versions, dependency manifests, the remote capability traits, job polling,
//! packaging and the migration pipeline. Nothing in here knows about HTTP
//! details or environment variables; the `solution-promote` binary crate
//! supplies a concrete instance client and the configuration.
//!
//! # Usage
//! Implement [`contract::RemoteFileAccess`], [`contract::JobStatusApi`] and
//! [`contract::SolutionApi`] for a platform client, then drive
//! [`packager`] and [`migrate`] with it.

pub mod config;
pub mod contract;
pub mod error;
pub mod manifest;
pub mod migrate;
pub mod packager;
pub mod paths;
pub mod poller;
pub mod version;

pub use error::{PromoteError, Result};
