//! Darkroom CLI - content-addressed image ingestion pipeline.
//!
//! Uploads are deduplicated into `canonical/` by content hash, then each
//! canonical image gets a grayscale variant and a fixed-size float tensor.
//! All data lives in a local filesystem object store.
//!
//! # Usage
//!
//! ```bash
//! # Upload and run the whole pipeline
//! darkroom upload photo1.jpg photo2.jpg --process
//!
//! # Replay a notification batch, following created objects
//! darkroom handle events.json --follow
//!
//! # Catch up on anything left in incoming/ or canonical/
//! darkroom sweep
//!
//! # Inspect a namespace
//! darkroom ls canonical
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;

/// Darkroom - content-addressed image ingestion pipeline.
#[derive(Parser, Debug)]
#[command(name = "darkroom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "DARKROOM_CONFIG")]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Put files into incoming/
    Upload(cli::upload::UploadArgs),

    /// Process a notification payload
    Handle(cli::handle::HandleArgs),

    /// Process notifications streamed on stdin, one payload per line
    Listen(cli::listen::ListenArgs),

    /// Process everything waiting in incoming/ and canonical/
    Sweep(cli::sweep::SweepArgs),

    /// List the objects in a namespace
    Ls(cli::ls::LsArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let loaded = match &cli.config {
        Some(path) => darkroom_core::Config::load_from(path),
        None => darkroom_core::Config::load(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) if cli.config.is_some() => {
            anyhow::bail!("Failed to load config: {e}");
        }
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `darkroom config path`."
            );
            darkroom_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("Darkroom v{}", darkroom_core::VERSION);

    match cli.command {
        Commands::Upload(args) => cli::upload::execute(args, config).await,
        Commands::Handle(args) => cli::handle::execute(args, config).await,
        Commands::Listen(args) => cli::listen::execute(args, config).await,
        Commands::Sweep(args) => cli::sweep::execute(args, config).await,
        Commands::Ls(args) => cli::ls::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args, config).await,
    }
}
