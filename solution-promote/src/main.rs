use anyhow::Result;
use clap::Parser;
use solution_promote::cli::{run, Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // Instance hosts and tokens usually come from a local .env during development.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let command = match &cli.command {
        Commands::Promote(_) => "promote",
        Commands::PromoteSb(_) => "promote-sb",
        Commands::Migrate => "migrate",
    };
    tracing::info!(command, "Starting solution promotion");

    match run(cli).await {
        Ok(()) => {
            tracing::info!(command, "All selected steps completed");
            Ok(())
        }
        Err(e) => {
            tracing::error!(command, error = %e, "Promotion aborted");
            Err(e)
        }
    }
}
