mod actuator;
mod commands;
mod config;
mod feed;
mod scheduler;
mod singleton;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calblock")]
#[command(about = "Block apps and websites on a calendar schedule")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the blocking daemon until interrupted
    Run {
        /// Path to config.toml (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Parse an event description and print what it would block
    Check {
        /// File containing the description; reads stdin when omitted
        file: Option<PathBuf>,
    },
    /// Remove leftover managed hosts entries from a previous run
    Unblock {
        /// Path to config.toml (defaults to the user config directory)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("calblock=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config } => commands::run::run(config.as_deref()).await,
        Commands::Check { file } => commands::check::run(file.as_deref()),
        Commands::Unblock { config } => commands::unblock::run(config.as_deref()),
    }
}
