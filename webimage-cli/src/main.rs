//! WebImage CLI - Command-line interface
//!
//! Loads remote images through the two-tier cache and manages the cache on
//! disk.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;

#[derive(Parser)]
#[command(name = "webimage")]
#[command(version, about = "Fetch and cache remote images", long_about = None)]
struct Cli {
    /// Mirror log output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an image, answering from the cache when possible
    Fetch {
        /// Image address
        url: String,

        /// Write the image to this file
        #[arg(short, long)]
        output: Option<String>,

        /// Do not read or write the disk cache
        #[arg(long)]
        memory_only: bool,

        /// Show the cached image, then download it again
        #[arg(long)]
        refresh: bool,

        /// Download even if the address failed before
        #[arg(long)]
        retry_failed: bool,

        /// Decode partial images while downloading
        #[arg(long)]
        progressive: bool,
    },

    /// Manage the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Inspect the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch {
            url,
            output,
            memory_only,
            refresh,
            retry_failed,
            progressive,
        } => commands::fetch::run(FetchArgs {
            url,
            output,
            memory_only,
            refresh,
            retry_failed,
            progressive,
            verbose: cli.verbose,
        }),
        Commands::Cache { action } => commands::cache::run(action, cli.verbose),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
