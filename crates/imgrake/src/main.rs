//! imgrake CLI - keyword-driven image dataset builder.
//!
//! imgrake reads a list of search terms, downloads candidate images for each
//! one into a content-addressed directory, and normalizes every file to one
//! canonical format and size. Runs can be stopped and resumed by index.
//!
//! # Usage
//!
//! ```bash
//! # Crawl every keyword in the list
//! imgrake crawl --keywords keywords.txt --root ./Images --max-images 100
//!
//! # Pick up where the last run stopped
//! imgrake crawl --resume
//!
//! # Re-normalize existing directories to a new size
//! imgrake normalize --width 128 --height 128
//!
//! # Delete artifacts that do not decode
//! imgrake prune
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod logging;

/// imgrake - resumable keyword image acquisition and normalization.
#[derive(Parser, Debug)]
#[command(name = "imgrake")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "IMGRAKE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and normalize images for every keyword in the list
    Crawl(cli::crawl::CrawlArgs),

    /// Normalize the artifacts of existing work directories
    Normalize(cli::normalize::NormalizeArgs),

    /// Delete artifacts that cannot be decoded
    Prune(cli::prune::PruneArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match cli::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => return Err(e),
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `imgrake config path`."
            );
            imgrake_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("imgrake v{}", imgrake_core::VERSION);

    match cli.command {
        Commands::Crawl(args) => cli::crawl::execute(args, config).await,
        Commands::Normalize(args) => cli::normalize::execute(args, config).await,
        Commands::Prune(args) => cli::prune::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, cli.config.as_deref()).await,
    }
}
