use anyhow::Result;
use clap::Parser;
use tracing::{debug, error};

use super::commands::Commands;
use super::env::CliArgs;
use super::info::cmd_info;
use super::runtime::{init_logging, load_config};
use super::simulate::cmd_simulate;

pub async fn run() -> Result<()> {
    let cli = CliArgs::parse();

    init_logging(&cli.log_level, cli.debug)?;
    debug!("Starting geoperm v{}", env!("CARGO_PKG_VERSION"));

    let loaded = load_config(cli.config.as_ref())?;

    let result = match cli.command {
        Commands::Simulate(args) => cmd_simulate(args, loaded.config, cli.output).await,
        Commands::Info => cmd_info(&loaded, cli.output),
    };

    if let Err(err) = &result {
        error!("Command failed: {:#}", err);
    }
    result
}
