//! pathtrail - record every file accessed under a set of directory trees
//!
//! This binary provides the command-line interface for the access monitor.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::Parser;
use pathtrail::{run_session, summarize, InstanceLock};
use pathtrail_core::MonitorConfig;
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pathtrail")]
#[command(about = "Record every file accessed under a set of directory trees")]
#[command(version)]
struct Cli {
    /// Directory trees to monitor
    #[arg(value_name = "ROOT")]
    roots: Vec<PathBuf>,

    /// Access log file (default: file_monitor.log)
    #[arg(short, long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Seconds between flushes of newly seen paths (default: 60)
    #[arg(short, long, value_name = "SECS")]
    interval: Option<u64>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Single-instance lock file
    #[arg(long, value_name = "FILE")]
    lock_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Command-line values take precedence over every configuration layer
    fn apply_to(self, config: &mut MonitorConfig) {
        if !self.roots.is_empty() {
            config.roots = self.roots;
        }
        if let Some(log) = self.log {
            config.log_path = log;
        }
        if let Some(interval) = self.interval {
            config.flush_interval_secs = interval;
        }
        if let Some(lock_file) = self.lock_file {
            config.lock_path = lock_file;
        }
        config.verbose |= self.verbose;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = MonitorConfig::load(cli.config.as_deref())?;
    cli.apply_to(&mut config);

    init_logging(config.verbose)?;
    config.validate()?;

    let _lock = InstanceLock::acquire(&config.lock_path)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let session = tokio::task::spawn_blocking({
        let shutdown = shutdown.clone();
        move || run_session(&config, shutdown)
    });

    let stats = session.await.context("Monitor task panicked")??;
    info!("Monitoring stopped: {}", summarize(&stats));
    Ok(())
}

/// Initialize logging system
///
/// Only errors are shown unless verbose; `RUST_LOG` overrides either level.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "error" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

/// Cancel `shutdown` on the first SIGINT or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            error!("Error setting up SIGTERM handler: {e}");
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received SIGINT, stopping"),
                Err(e) => {
                    error!("Error setting up signal handler: {e}");
                    return;
                }
            }
            shutdown.cancel();
            return;
        }
    };

    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error setting up SIGINT handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = interrupt => info!("Received SIGINT, stopping"),
        _ = terminate.recv() => info!("Received SIGTERM, stopping"),
    }
    shutdown.cancel();
}
