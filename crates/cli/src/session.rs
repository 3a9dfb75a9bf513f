//! Monitoring session setup
//!
//! Everything here blocks; the binary runs it on the blocking thread pool.

use anyhow::{Context, Result};
use pathtrail_core::MonitorConfig;
use pathtrail_watcher::{
    AccessLedger, DispatchConfig, InotifyBackend, Monitor, MonitorStats, WatchTree,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Build a monitor from `config` and run it until `shutdown` is cancelled
///
/// Fails before any watch is installed if the notification facility or the
/// access log cannot be opened.
pub fn run_session(config: &MonitorConfig, shutdown: CancellationToken) -> Result<MonitorStats> {
    let backend = InotifyBackend::new().context("Failed to create notification facility")?;
    let ledger = AccessLedger::load(&config.log_path)
        .with_context(|| format!("Failed to load access log {}", config.log_path.display()))?;

    info!("Loaded {} entries from existing log", ledger.known_len());
    info!("Logging to: {}", config.log_path.display());
    info!("Flush interval: {} seconds", config.flush_interval_secs);

    let mut monitor = Monitor::new(
        WatchTree::new(backend),
        ledger,
        DispatchConfig::from(config),
        shutdown,
    );

    let covered = monitor.watch_roots(&config.roots);
    if covered == 0 {
        warn!("None of the {} roots could be watched", config.roots.len());
    }

    monitor.run().context("Monitoring stopped on an unrecoverable error")
}

/// One-line summary of a finished session
pub fn summarize(stats: &MonitorStats) -> String {
    format!(
        "{} events, {} new paths, {} directories added, {} flushes ({} failed), {} overflows",
        stats.events_decoded,
        stats.paths_recorded,
        stats.directories_added,
        stats.flushes,
        stats.failed_flushes,
        stats.overflows
    )
}
