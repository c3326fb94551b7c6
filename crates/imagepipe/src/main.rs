//! imagepipe CLI - chainable batch image pipelines.
//!
//! Selects files with glob patterns, runs them through a chain of image
//! operations and saves the last generation under the original file names.
//!
//! # Usage
//!
//! ```bash
//! # Thumbnails of every JPEG, saved under their original names
//! imagepipe run 'photos/*.jpg' --op thumbnail:100 --out thumbs/
//!
//! # Trim, square-crop and compose into a sprite sheet with CSS
//! imagepipe run 'icons/*.png' --op trim:8 --op crop:32x32 \
//!     --sprite out/icons.png --stylesheet out/icons.css
//!
//! # View configuration
//! imagepipe config show
//! ```

use clap::{Parser, Subcommand};
use imagepipe_core::{Config, TempRegistry};
use std::sync::Arc;
use std::time::Duration;

mod cli;
mod logging;

/// imagepipe - chainable batch image pipelines.
#[derive(Parser, Debug)]
#[command(name = "imagepipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a chain of operations over a set of files
    Run(cli::run::RunArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

/// How long stray workers may keep the runtime alive after the command ends.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go to stderr directly.
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: could not read {}: {e}\n  Continuing with built-in defaults.",
                Config::default_path().display()
            );
            Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("imagepipe v{}", imagepipe_core::VERSION);

    let registry = Arc::new(TempRegistry::from_config(&config));
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        tokio::select! {
            result = dispatch(cli.command, config, Arc::clone(&registry)) => result,
            _ = tokio::signal::ctrl_c() => {
                tracing::warn!("Interrupted, cleaning up");
                Err(anyhow::anyhow!("interrupted"))
            }
        }
    });

    // Blocking tasks get a grace period; timed-out workers are detached and not awaited.
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    registry.sweep();
    result
}

async fn dispatch(
    command: Commands,
    config: Config,
    registry: Arc<TempRegistry>,
) -> anyhow::Result<()> {
    match command {
        Commands::Run(args) => cli::run::execute(args, config, registry).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
