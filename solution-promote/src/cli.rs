/// # solution-promote CLI Interface (Module)
///
/// Command parsing and the async entrypoint for the `solution-promote` binary.
///
/// All domain logic (versions, manifests, packaging, migration) lives in the
/// [`solution-promote-core`] crate; [`crate::commands`] sequences it per
/// subcommand. No flag takes a value: paths, names and credentials come from
/// the environment (see [`crate::load_config`]).
///
/// ## Subcommands
/// - `promote`: filesystem flow projects
/// - `promote-sb`: solution builder projects
/// - `migrate`: move the latest solution and its dependencies to the target
///
/// [`solution-promote-core`]: ../../solution-promote-core/
use std::path::Path;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::client::HttpInstance;
use crate::commands;
use crate::load_config::load_config;

/// CLI for promoting ibsolution artifacts between platform instances.
#[derive(Parser, Debug)]
#[clap(
    name = "solution-promote",
    version,
    about = "Compile, promote, deploy and migrate ibsolution artifacts between platform instances"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Promote a filesystem flow project
    Promote(PromoteArgs),
    /// Promote a solution builder project
    PromoteSb(PromoteSbArgs),
    /// Migrate the latest solution and its dependencies from source to target
    Migrate,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PromoteArgs {
    /// Stage the source solution in the working dir, compile and package it
    #[clap(long)]
    pub compile_source_solution: bool,
    /// Deploy (or publish, with --marketplace) the latest source solution
    #[clap(long)]
    pub publish_source_solution: bool,
    /// Copy the latest source solution to the target
    #[clap(long)]
    pub promote_solution_to_target: bool,
    /// Deploy (or publish, with --marketplace) the latest target solution
    #[clap(long)]
    pub publish_target_solution: bool,
    /// Move the solution's marketplace dependencies to the target and publish them
    #[clap(long)]
    pub upload_dependencies: bool,
    /// Write the latest target solution to the current directory
    #[clap(long)]
    pub download_ibsolution: bool,
    /// Append PACKAGE_VERSION to $GITHUB_ENV
    #[clap(long)]
    pub set_github_actions_env_var: bool,
    /// Print the Azure DevOps command setting PACKAGE_VERSION
    #[clap(long)]
    pub set_azure_devops_env_var: bool,
    /// Publish to the marketplace instead of deploying
    #[clap(long)]
    pub marketplace: bool,
    /// Run every remote step
    #[clap(long)]
    pub remote_flow: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct PromoteSbArgs {
    /// Compile the next patch version of the flow and package it
    #[clap(long)]
    pub compile_source_solution: bool,
    /// Deploy the latest source solution
    #[clap(long)]
    pub deploy_source_solution: bool,
    /// Copy the latest source solution to the target
    #[clap(long)]
    pub promote_solution_to_target: bool,
    /// Move the dependencies listed in $DEPENDENCIES to the target and publish them
    #[clap(long)]
    pub upload_dependencies: bool,
    /// Deploy the latest target solution
    #[clap(long)]
    pub deploy_target_solution: bool,
    /// Append PACKAGE_VERSION to $GITHUB_ENV
    #[clap(long)]
    pub set_github_actions_env_var: bool,
    /// Print the Azure DevOps command setting PACKAGE_VERSION
    #[clap(long)]
    pub set_azure_devops_env_var: bool,
    /// Also write the promoted solution to the current directory
    #[clap(long)]
    pub download_ibsolution: bool,
    /// Run every remote step
    #[clap(long)]
    pub remote_flow: bool,
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let config = load_config()?;
    let source = HttpInstance::new(config.source.clone()).with_chunk_size(config.chunk_size);
    let target = HttpInstance::new(config.target.clone()).with_chunk_size(config.chunk_size);
    let local_dir = Path::new(".");

    let result = match &cli.command {
        Commands::Promote(args) => {
            tracing::info!(command = "promote", ?args, "Starting promotion");
            commands::promote(&source, &target, &config, args, local_dir).await
        }
        Commands::PromoteSb(args) => {
            tracing::info!(command = "promote-sb", ?args, "Starting promotion");
            commands::promote_sb(&source, &target, &config, args, local_dir).await
        }
        Commands::Migrate => {
            tracing::info!(command = "migrate", "Starting migration");
            commands::migrate(&source, &target, &config).await.map(|_| ())
        }
    };

    match &result {
        Ok(()) => tracing::info!("All selected steps completed"),
        Err(e) => tracing::error!(error = %e, "Command failed"),
    }
    result
}
