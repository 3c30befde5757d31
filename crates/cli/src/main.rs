//! settle - watch directories and report paths once they stop changing

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod logging;
mod output;

/// Debounced, stability-checked directory watcher
#[derive(Parser)]
#[command(name = "settle")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch directory trees and print settled or removed paths
    Watch {
        /// Root directories to watch (recursively)
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// TOML file with watcher settings
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Print one JSON object per line
        #[arg(long)]
        json: bool,
    },
    /// Print a snapshot of a directory tree
    Tree {
        /// Directory to snapshot
        root: PathBuf,
    },
    /// Compare two directory trees
    Diff {
        /// Baseline directory
        old: PathBuf,
        /// Directory to compare against the baseline
        new: PathBuf,
        /// Print the differences as a JSON array
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Held until exit so buffered file logs are flushed
    let _log_guard = logging::init(cli.verbose, cli.log_file.as_deref())?;

    match cli.command {
        Commands::Watch { roots, config, json } => {
            cmd::watch::run(&roots, config.as_deref(), json).await
        }
        Commands::Tree { root } => cmd::tree::run(&root).await,
        Commands::Diff { old, new, json } => cmd::diff::run(&old, &new, json).await,
    }
}
