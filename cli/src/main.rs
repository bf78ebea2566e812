mod cli;
mod commands;

use anyhow::Result;
use cli::{Cli, Commands};
use commands::{filter, score, search, suggest};
use growmap::OverlayConfig;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

/// Config file (if any) with the command-line token applied on top.
pub fn load_config(cli: &Cli) -> Result<OverlayConfig> {
    let config = match &cli.config {
        Some(path) => OverlayConfig::from_json_file(path)?,
        None => OverlayConfig::default(),
    };
    Ok(match &cli.token {
        Some(token) => config.with_access_token(token),
        None => config,
    })
}

pub fn run() -> Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match &cli.command {
        Commands::Search(args) => search::run(&cli, args),
        Commands::Suggest(args) => suggest::run(&cli, args),
        Commands::Filter(args) => filter::run(&cli, args),
        Commands::Score(args) => score::run(&cli, args),
    }
}

fn main() -> Result<()> { run() }
