//! livedev - push HTML/CSS/JS edits into a running browser tab.

use anyhow::Result;
use clap::{ColorChoice, Parser};
use livedev::cli::{self, Cli, Commands};
use livedev::config::{LiveConfig, init_config};
use livedev::logger;

fn main() -> Result<()> {
    cli::serve::setup_shutdown_handler()?;

    let cli: &'static Cli = Box::leak(Box::new(Cli::parse()));

    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {}
    }
    logger::set_verbose(cli.verbose);

    init_config(LiveConfig::load(cli)?);

    match &cli.command {
        Commands::Serve { .. } => cli::serve::serve(),
        Commands::Instrument { file, json } => cli::instrument::run(file, *json),
    }
}
