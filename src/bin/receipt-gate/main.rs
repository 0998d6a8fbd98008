//! receipt-gate CLI entry point.

mod cli;

use clap::Parser;
use cli::Cli;
use receipt_gate::GatewayBuilder;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    info!("receipt-gate v{}", env!("CARGO_PKG_VERSION"));

    let write_config = cli.write_config;
    let config_path = cli.config_path();

    // Build configuration
    let mut config = cli.into_config()?;

    if write_config {
        // Keep secrets in the environment, not on disk.
        config.backend.api_key = None;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        config.to_file(&config_path)?;
        info!("Configuration written to {}", config_path.display());
        return Ok(());
    }

    // Build and run the gateway
    let mut gateway = GatewayBuilder::new(config).build().await?;

    // Run until shutdown
    gateway.run().await?;

    info!("Goodbye!");
    Ok(())
}
