mod args;
mod commands;
mod shared;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::{AppCommand, Cli};
use commands::{run_gnss, run_http, run_identity, run_mode};

// Top-level entrypoint: set up logging, parse CLI args and dispatch to a command module.
fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        AppCommand::Gnss(args) => run_gnss(args),
        AppCommand::Http(args) => run_http(args),
        AppCommand::Identity(args) => run_identity(args),
        AppCommand::Run(args) => run_mode(args),
    }
}
