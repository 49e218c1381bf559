//! Switchyard CLI entry point

use anyhow::Context;
use clap::Parser;
use tracing::info;

use switchyard_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let config = load_configuration(&cli)?;

    CommandDispatcher::execute(cli, config)
        .await
        .context("command execution failed")?;

    Ok(())
}

/// Setup logging based on verbosity level
fn setup_logging(verbose: bool) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Logs go to stderr so command output stays machine-readable
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> anyhow::Result<AppConfig> {
    match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            AppConfig::load_from_file(path).with_context(|| format!("invalid configuration {path}"))
        }
        None => {
            info!("Using default configuration");
            Ok(AppConfig::default())
        }
    }
}
