//! Thoughtgraph CLI entry point.

use anyhow::Context;
use clap::Parser;

use thoughtgraph::cli::{commands, handle_error, Cli, Commands};
use thoughtgraph::infrastructure::logging::{LogConfig, LoggerImpl};
use thoughtgraph::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli.command, cli.config.as_deref(), cli.json).await {
        handle_error(err, cli.json);
    }
}

async fn run(command: Commands, config_path: Option<&std::path::Path>, json: bool) -> anyhow::Result<()> {
    let config = match config_path {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };

    let log_config = LogConfig::try_from(&config.logging).context("Invalid logging configuration")?;
    // Flushes buffered file output when dropped at exit
    let _logger = LoggerImpl::init(&log_config)?;

    match command {
        Commands::Run(args) => commands::run::execute(args, config, json).await,
        Commands::Calibrate(args) => commands::calibrate::execute(args, json).await,
    }
}
