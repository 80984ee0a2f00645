//! Identity and access kernel - CLI entry point
//!
//! Commands:
//!   serve   - Start the HTTP API server (default)
//!   migrate - Run database migrations
//!   reset   - Drop all tables

use anyhow::Result;
use identkern::{config::Config, migration, server, telemetry};
use clap::{Parser, Subcommand};
use tracing::info;

#[derive(Parser)]
#[command(name = "identity-kernel")]
#[command(about = "Identity and access kernel service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve,
    /// Run database migrations
    Migrate,
    /// Drop all tables (local/dev only)
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    let prometheus_handle = telemetry::init(&config.telemetry);

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Migrate) => {
            info!("Running database migrations...");
            migration::run_migrations(&config).await?;
            info!("Migrations completed successfully");
        }
        Some(Commands::Reset) => {
            info!("Resetting database (dropping all tables)...");
            migration::reset_database(&config).await?;
            info!("Database reset completed");
        }
        Some(Commands::Serve) | None => {
            info!("Starting identity kernel service");
            info!("HTTP server listening on {}", config.http_addr());
            server::run(config, prometheus_handle).await?;
        }
    }

    Ok(())
}
