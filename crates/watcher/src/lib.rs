#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

//! Recursive access monitoring with a deduplicated, append-only path log
//!
//! This crate provides the moving parts of the pathtrail monitor:
//! - Recursive watch installation over inotify, including directories created later
//! - Decoding of raw notification batches
//! - An access ledger that persists every distinct path exactly once
//! - A single-threaded dispatcher with timed and shutdown flushes
//!
//! # Example
//!
//! ```no_run
//! use pathtrail_watcher::{AccessLedger, DispatchConfig, InotifyBackend, Monitor, WatchTree};
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tree = WatchTree::new(InotifyBackend::new()?);
//! let ledger = AccessLedger::load("file_monitor.log")?;
//! let shutdown = CancellationToken::new();
//!
//! let mut monitor = Monitor::new(tree, ledger, DispatchConfig::default(), shutdown.clone());
//! monitor.watch_roots(&[PathBuf::from("/srv/data")]);
//!
//! // Runs until `shutdown.cancel()` is called from elsewhere
//! let stats = monitor.run()?;
//! println!("recorded {} paths", stats.paths_recorded);
//! # Ok(())
//! # }
//! ```

// Private implementation modules
mod backend;
mod clock;
mod config;
mod events;
mod ledger;
mod monitor;
mod resolve;
mod watcher;

#[cfg(target_os = "linux")]
mod inotify;

pub mod testing;

// Public exports - minimal API surface
pub use backend::{NotifyBackend, WatchHandle};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use events::{EventDecoder, EventMask, RawEvent, EVENT_HEADER_LEN, WATCH_MASK};
pub use ledger::AccessLedger;
pub use monitor::{IterationOutcome, Monitor, MonitorState, MonitorStats};
pub use resolve::{absolute_no_follow, canonicalize};
pub use watcher::{WatchOutcome, WatchTree};

#[cfg(target_os = "linux")]
pub use inotify::InotifyBackend;
