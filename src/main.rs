//! workwatch - workspace change monitor
//!
//! Watches a workspace and prints one JSON line per consumer operation.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use workwatch::observability::{config_from_env, init_tracing};
use workwatch::watcher::{JsonLinesConsumer, WorkspaceWatcher};
use workwatch::{Config, Result};

/// workwatch - workspace change monitor
#[derive(Parser, Debug)]
#[command(name = "workwatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Workspace root to watch
    #[arg(short, long, env = "WORKWATCH_ROOT", default_value = ".")]
    root: std::path::PathBuf,

    /// Debounce window in milliseconds
    #[arg(long, env = "WORKWATCH_DEBOUNCE_MS", default_value = "3000")]
    debounce_ms: u64,

    /// Log level (trace, debug, info, warn, error) [env: WORKWATCH_LOG_LEVEL]
    #[arg(long)]
    log_level: Option<String>,

    /// Enable JSON logging output [env: WORKWATCH_LOG_JSON]
    #[arg(long)]
    log_json: bool,

    /// Extra ignore patterns (gitignore syntax)
    #[arg(short, long, env = "WORKWATCH_IGNORE", value_delimiter = ',')]
    ignore: Vec<String>,

    /// Event batches buffered between watcher and router
    #[arg(long, env = "WORKWATCH_CHANNEL_CAPACITY", default_value = "100")]
    channel_capacity: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut tracing_config = config_from_env();
    if let Some(level) = cli.log_level {
        tracing_config.level = level;
    }
    tracing_config.json |= cli.log_json;
    init_tracing(&tracing_config);

    tracing::info!("workwatch v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        root: cli.root,
        debounce_ms: cli.debounce_ms,
        log_level: tracing_config.level,
        ignore_patterns: cli.ignore,
        channel_capacity: cli.channel_capacity,
    };

    tracing::debug!(?config, "Configuration loaded");
    config.validate()?;

    let consumer = Arc::new(JsonLinesConsumer::new(std::io::stdout()));
    let mut watcher = WorkspaceWatcher::start(&config.watcher_config(), &consumer).await?;

    tracing::info!(root = %watcher.root().display(), "Watching workspace");

    shutdown_signal().await;

    watcher.dispose();
    let stats = watcher.router().stats();
    tracing::info!(
        routed = stats.events_routed,
        dispatched = stats.operations_dispatched,
        "Shutdown complete"
    );
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
