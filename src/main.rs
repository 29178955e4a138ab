//! signal-memory CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use signal_memory::cli::{commands, handle_error, Cli};
use signal_memory::infrastructure::config::ConfigLoader;
use signal_memory::infrastructure::logging::{LogConfig, LoggerImpl};
use signal_memory::services::DecisionMemory;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    if let Err(err) = run(cli).await {
        handle_error(err, json);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let log_config = LogConfig::from_settings(&config.logging)?;
    let _logger = LoggerImpl::init(&log_config).context("Failed to initialize logging")?;

    let memory = DecisionMemory::from_config(&config)
        .await
        .context("Failed to open signal memory")?;

    commands::execute(&memory, cli.command, cli.json).await
}
