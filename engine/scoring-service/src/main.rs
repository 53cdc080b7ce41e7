//! Fantasy Scoring Service
//!
//! Command-line entry point: scores match performances and pushes the results
//! through teams, contests and user progression.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use scoring_service::{cli, initialize_logging, load_configuration, Cli};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Load configuration
    let config = load_configuration(cli.config.as_deref()).context("Failed to load configuration")?;

    // Initialize logging once the configured level is known
    initialize_logging(&config.logging)?;
    info!("Starting Fantasy Scoring Service v{}", env!("CARGO_PKG_VERSION"));

    cli::run(&cli, &config).await
}
