//! Bank Server - Main Application Entry Point
//!
//! Reads configuration from the environment (and an optional `.env` file), then
//! serves deposit, withdrawal and history requests over TCP until Ctrl-C.
//! See the library crate documentation for the architecture.

use rust_bank_server::config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging with tracing subscriber. Reads RUST_LOG environment variable (defaults to "info" level)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded");

    rust_bank_server::run(config).await?;

    tracing::info!("Server stopped");
    Ok(())
}
