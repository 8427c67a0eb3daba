//! Causa CLI
//!
//! Terminal-first interface for exported causal histories.

mod commands;
mod config;
mod history;
mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "causa")]
#[command(author = "LogicCrafter")]
#[command(version = "0.1.0")]
#[command(about = "Causa - inspect, time-travel and analyze causal histories", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log library activity to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize an exported history
    Inspect(commands::inspect::InspectArgs),

    /// List the universes of an exported history
    Branches(commands::branches::BranchesArgs),

    /// Show the value at a point in time or at an event
    At(commands::at::AtArgs),

    /// Measure entropy, optionally against a baseline
    Entropy(commands::entropy::EntropyArgs),

    /// Replay several histories through the emergence detector
    Replay(commands::replay::ReplayArgs),
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match config::CliConfig::load(cli.config.as_deref()).await {
        Ok(c) => c,
        Err(e) => {
            output::error(&e);
            std::process::exit(1);
        }
    };

    let exit_code = match cli.command {
        Commands::Inspect(args) => commands::inspect::run(args).await,
        Commands::Branches(args) => commands::branches::run(args).await,
        Commands::At(args) => commands::at::run(args).await,
        Commands::Entropy(args) => commands::entropy::run(args, &config).await,
        Commands::Replay(args) => commands::replay::run(args, &config).await,
    };

    std::process::exit(exit_code);
}
