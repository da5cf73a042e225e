//! Tidemark CLI - plan and run ordered SQL migrations

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::Cli;
use commands::{down, new, status, up};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match &cli.command {
        cli::Commands::Up(args) => up::execute(args, &cli.global).await,
        cli::Commands::Down(args) => down::execute(args, &cli.global).await,
        cli::Commands::Status(args) => status::execute(args, &cli.global).await,
        cli::Commands::New(args) => new::execute(args, &cli.global).await,
    }
}

/// `RUST_LOG` wins; otherwise `--verbose` selects debug.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp(None)
        .init();
}
