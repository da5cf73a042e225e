//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Tidemark - apply and revert ordered SQL migrations
#[derive(Parser, Debug)]
#[command(name = "tm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to project directory
    #[arg(short = 'p', long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Override config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Named target from the config (database connection override)
    #[arg(short, long, global = true, env = "TIDEMARK_TARGET")]
    pub target: Option<String>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Apply pending migrations
    Up(UpArgs),

    /// Roll back the most recently applied migrations
    Down(DownArgs),

    /// Show applied and pending migrations
    Status(StatusArgs),

    /// Create a new, empty migration file
    New(NewArgs),
}

/// Arguments for the up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Apply at most this many pending migrations
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the down command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Number of migrations to roll back
    #[arg(short, long, default_value_t = 1)]
    pub steps: usize,

    /// Print the plan without executing it
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Table format
    Table,
    /// JSON output
    Json,
}

/// Arguments for the new command
#[derive(Args, Debug)]
pub struct NewArgs {
    /// Descriptive name, e.g. create_users
    pub name: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
