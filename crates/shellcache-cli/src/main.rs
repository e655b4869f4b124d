//! shellcache - command-line host for the offline app-shell cache.
//!
//! Drives install, activate, and cache-first fetches against a cache
//! directory on disk and the real network.

mod cli;
mod commands;

use std::io;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::{Cli, Commands};
use commands::Settings;

/// Directory for rolling log files; stderr only when unset
const LOG_DIR_ENV: &str = "SHELLCACHE_LOG_DIR";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "shellcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let _guard = init_tracing();

    let settings = Settings::resolve(&cli)?;
    info!(version = %settings.config.version, "shellcache starting");

    match cli.command {
        Commands::Install => commands::install_cmd(&settings).await,
        Commands::Activate => commands::activate_cmd(&settings).await,
        Commands::Register => commands::register_cmd(&settings).await,
        Commands::Fetch(ref args) => commands::fetch_cmd(&settings, args).await,
        Commands::List => commands::list_cmd(&settings).await,
        Commands::Config(ref command) => commands::config_cmd(&settings, command),
    }
}
