//! customer-accounts
//!
//! Command line entry point for the event-sourced customer accounts.

use anyhow::Result;
use clap::Parser;
use customer_accounts::config;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to ACCOUNTS_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!(dev_mode = config.dev_mode, "Starting customer-accounts");

    if let Err(e) = cli.run(config).await {
        error!(error = %e, "Command failed");
        return Err(e);
    }

    Ok(())
}
