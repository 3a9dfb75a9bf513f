//! Single-threaded dispatch loop
//!
//! Each iteration waits a bounded time for a raw batch, routes every named
//! record to the ledger (file activity) and/or the watch tree (new
//! subdirectories), then flushes the ledger if the interval has elapsed. The
//! stop request is polled once per iteration; shutdown always ends with a
//! final flush and the release of every watch.

use crate::backend::NotifyBackend;
use crate::clock::{Clock, SystemClock};
use crate::config::DispatchConfig;
use crate::events::{EventDecoder, EventMask, RawEvent};
use crate::ledger::AccessLedger;
use crate::watcher::{WatchOutcome, WatchTree};
use pathtrail_core::error::{Error, Result};
use std::io;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Lifecycle of a [`Monitor`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    /// Terminal; entered once the loop has exited
    Stopping,
}

/// What one dispatch iteration did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationOutcome {
    /// The wait elapsed without events
    Idle,
    /// A batch with this many records was dispatched
    Dispatched(usize),
    /// The wait was interrupted and should simply be retried
    Interrupted,
}

/// Counters reported when a session ends
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    pub events_decoded: u64,
    pub paths_recorded: u64,
    pub directories_added: u64,
    pub stale_events: u64,
    pub overflows: u64,
    pub flushes: u64,
    pub failed_flushes: u64,
}

/// Dispatcher tying a [`WatchTree`] to an [`AccessLedger`]
#[derive(Debug)]
pub struct Monitor<B, C: Clock = SystemClock> {
    tree: WatchTree<B>,
    ledger: AccessLedger<C>,
    config: DispatchConfig,
    shutdown: CancellationToken,
    buffer: Vec<u8>,
    state: MonitorState,
    stats: MonitorStats,
}

impl<B: NotifyBackend, C: Clock> Monitor<B, C> {
    /// Create a dispatcher; `shutdown` is the only way to stop [`Monitor::run`]
    pub fn new(
        tree: WatchTree<B>,
        ledger: AccessLedger<C>,
        config: DispatchConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let buffer = vec![0u8; config.buffer_len];
        Self {
            tree,
            ledger,
            config,
            shutdown,
            buffer,
            state: MonitorState::Running,
            stats: MonitorStats::default(),
        }
    }

    /// Watch every root, logging and skipping the ones that fail
    ///
    /// Returns the number of roots now covered.
    pub fn watch_roots(&mut self, roots: &[PathBuf]) -> usize {
        let mut covered = 0;
        for root in roots {
            match self.tree.watch(root) {
                Ok(_) => covered += 1,
                Err(e) => warn!("Skipping root {}: {e}", root.display()),
            }
        }
        covered
    }

    /// Run until the shutdown token is cancelled or waiting fails
    ///
    /// The final flush and watch release happen on both exits.
    pub fn run(&mut self) -> Result<MonitorStats> {
        info!(
            "Monitoring started: {} watches, log {}, flush every {:?}",
            self.tree.len(),
            self.ledger.log_path().display(),
            self.config.flush_interval()
        );

        let result = loop {
            if self.shutdown.is_cancelled() {
                break Ok(());
            }
            if let Err(e) = self.run_once() {
                error!("Stopping after fatal wait error: {e}");
                break Err(e);
            }
        };

        self.stop();
        result.map(|()| self.stats.clone())
    }

    /// One dispatch iteration: wait, decode, route, flush if due
    pub fn run_once(&mut self) -> Result<IterationOutcome> {
        let timeout = self.config.poll_timeout();
        let outcome = match self.tree.read_events(&mut self.buffer, timeout) {
            Ok(0) => IterationOutcome::Idle,
            Ok(len) => {
                let events: Vec<RawEvent> = EventDecoder::new(&self.buffer[..len]).collect();
                IterationOutcome::Dispatched(self.dispatch(events))
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("Wait interrupted, retrying");
                return Ok(IterationOutcome::Interrupted);
            }
            Err(e) => return Err(Error::Io(e)),
        };

        if self.ledger.is_flush_due(self.config.flush_interval()) {
            self.flush();
        }
        Ok(outcome)
    }

    /// Route decoded records, returning how many were seen
    pub fn dispatch(&mut self, events: Vec<RawEvent>) -> usize {
        let count = events.len();

        for event in events {
            self.stats.events_decoded += 1;

            if event.mask.contains(EventMask::Q_OVERFLOW) {
                self.stats.overflows += 1;
                warn!("Notification queue overflowed; some accesses were not observed");
                continue;
            }

            let Some(name) = event.name else {
                continue;
            };
            let Some(parent) = self.tree.path_for(event.handle) else {
                self.stats.stale_events += 1;
                trace!("Dropping event for unknown {}", event.handle);
                continue;
            };
            let full_path = parent.join(name);

            if !event.mask.is_dir() {
                debug!("Detected file access: {}", full_path.display());
                if self.ledger.record(full_path.clone()) {
                    self.stats.paths_recorded += 1;
                }
            }

            if event.mask.is_dir_creation() {
                match self.tree.watch(&full_path) {
                    Ok(WatchOutcome::Installed { .. }) => self.stats.directories_added += 1,
                    Ok(WatchOutcome::AlreadyWatched) => {}
                    Err(e) => warn!(
                        "Could not watch new directory {}: {e}",
                        full_path.display()
                    ),
                }
            }
        }

        count
    }

    fn flush(&mut self) {
        match self.ledger.flush() {
            Ok(0) => {}
            Ok(written) => {
                self.stats.flushes += 1;
                info!(
                    "Wrote {written} new paths to {}",
                    self.ledger.log_path().display()
                );
            }
            Err(e) => {
                self.stats.failed_flushes += 1;
                warn!(
                    "Flush failed, keeping {} paths pending: {e}",
                    self.ledger.pending_len()
                );
            }
        }
    }

    /// Enter the terminal state: final flush, then release every watch
    ///
    /// Calling it again only repeats the (idempotent) flush.
    pub fn stop(&mut self) {
        if self.state == MonitorState::Running {
            self.state = MonitorState::Stopping;
            debug!("Monitor stopping");
        }

        self.flush();
        let released = self.tree.release_all();
        info!(
            "Monitor stopped: released {released} watches, {} paths known",
            self.ledger.known_len()
        );
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn tree(&self) -> &WatchTree<B> {
        &self.tree
    }

    pub fn ledger(&self) -> &AccessLedger<C> {
        &self.ledger
    }
}
