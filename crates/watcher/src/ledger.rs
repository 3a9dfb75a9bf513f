//! Deduplicated, append-only log of accessed paths
//!
//! Every distinct path is written to the log at most once over the log's
//! whole lifetime: paths already in the log are loaded at startup, and a
//! path enters the pending batch only the first time it is seen.

use crate::clock::{Clock, SystemClock};
use pathtrail_core::error::{Error, Result, ResultExt};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Known and pending path sets backed by the access log
#[derive(Debug)]
pub struct AccessLedger<C: Clock = SystemClock> {
    log_path: PathBuf,
    /// Every path ever recorded, including those loaded from the log
    known: HashSet<PathBuf>,
    /// Paths not yet written; always a subset of `known`
    pending: HashSet<PathBuf>,
    last_flush: Instant,
    clock: C,
}

impl AccessLedger<SystemClock> {
    /// Loads the log at `log_path`; a missing file yields an empty ledger
    pub fn load(log_path: impl Into<PathBuf>) -> Result<Self> {
        Self::load_with_clock(log_path, SystemClock)
    }
}

impl<C: Clock> AccessLedger<C> {
    /// Loads the log at `log_path`, timing flushes with `clock`
    pub fn load_with_clock(log_path: impl Into<PathBuf>, clock: C) -> Result<Self> {
        let log_path = log_path.into();
        if log_path.is_dir() {
            return Err(Error::ledger(format!(
                "Access log {} is a directory",
                log_path.display()
            )));
        }
        let known = read_log(&log_path)?;
        info!(
            "Loaded {} recorded paths from {}",
            known.len(),
            log_path.display()
        );

        let last_flush = clock.now();
        Ok(Self {
            log_path,
            known,
            pending: HashSet::new(),
            last_flush,
            clock,
        })
    }

    /// Notes an access to `path`; returns `true` the first time it is seen
    pub fn record(&mut self, path: PathBuf) -> bool {
        if self.known.contains(&path) {
            return false;
        }
        self.known.insert(path.clone());
        self.pending.insert(path);
        true
    }

    /// Appends pending paths to the log, returning how many were written
    ///
    /// Nothing is opened when there is nothing pending. On failure the
    /// pending set is left untouched and the log is cut back to its previous
    /// length, so a retry writes the whole batch exactly once.
    pub fn flush(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }

        let mut batch: Vec<&PathBuf> = self.pending.iter().collect();
        batch.sort_by(|a, b| a.as_os_str().cmp(b.as_os_str()));

        let mut payload = Vec::new();
        for path in batch {
            payload.extend_from_slice(path.as_os_str().as_bytes());
            payload.push(b'\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)
            .context(format!(
                "Failed to open access log {}",
                self.log_path.display()
            ))?;

        append_batch(&mut file, &payload).context(format!(
            "Failed to write access log {}",
            self.log_path.display()
        ))?;

        if let Err(e) = file.sync_data() {
            warn!("Failed to sync {}: {e}", self.log_path.display());
        }

        let written = self.pending.len();
        self.pending.clear();
        self.last_flush = self.clock.now();
        debug!("Wrote {written} new paths to {}", self.log_path.display());
        Ok(written)
    }

    /// Whether `interval` has elapsed since the last successful flush
    pub fn is_flush_due(&self, interval: Duration) -> bool {
        self.clock.now().saturating_duration_since(self.last_flush) >= interval
    }

    /// Whether `path` has ever been recorded
    pub fn contains(&self, path: &Path) -> bool {
        self.known.contains(path)
    }

    /// Number of distinct paths known
    pub fn known_len(&self) -> usize {
        self.known.len()
    }

    /// Number of paths waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Paths waiting for the next flush, sorted
    pub fn pending(&self) -> Vec<PathBuf> {
        let mut pending: Vec<_> = self.pending.iter().cloned().collect();
        pending.sort();
        pending
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

impl<C: Clock> Drop for AccessLedger<C> {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            warn!("Dropping {} unflushed paths: {e}", self.pending.len());
        }
    }
}

fn read_log(log_path: &Path) -> Result<HashSet<PathBuf>> {
    let file = match File::open(log_path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(HashSet::new()),
        Err(e) => {
            return Err(Error::with_context(
                format!("Failed to read access log {}", log_path.display()),
                e,
            ))
        }
    };

    let mut known = HashSet::new();
    for line in BufReader::new(file).split(b'\n') {
        let line = line.context(format!("Failed to read access log {}", log_path.display()))?;
        if !line.is_empty() {
            known.insert(PathBuf::from(OsString::from_vec(line)));
        }
    }
    Ok(known)
}

/// Writes `payload` in one piece, truncating back to the original length if
/// the write fails partway
fn append_batch(file: &mut File, payload: &[u8]) -> io::Result<()> {
    let original_len = file.metadata()?.len();
    if let Err(e) = file.write_all(payload).and_then(|()| file.flush()) {
        if let Err(truncate_err) = file.set_len(original_len) {
            warn!("Failed to roll back partial write: {truncate_err}");
        }
        return Err(e);
    }
    Ok(())
}
