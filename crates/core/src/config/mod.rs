//! Configuration module for the pathtrail monitor
//!
//! Configuration is layered: built-in defaults, an optional TOML file, then
//! `PATHTRAIL_`-prefixed environment variables. The binary applies command-line
//! values on top before calling [`MonitorConfig::validate`].

mod defaults;
mod loading;


use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use defaults::*;

/// Immutable settings for one monitoring session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Append-only access log, one path per line
    #[serde(default = "default_log_path_buf")]
    pub log_path: PathBuf,

    /// Seconds between timed flushes of newly seen paths
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,

    /// Upper bound on a single wait for notification events, in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,

    /// Emit per-target and per-flush diagnostics
    #[serde(default = "default_verbose")]
    pub verbose: bool,

    /// Directory trees to monitor, in the order given
    #[serde(default)]
    pub roots: Vec<PathBuf>,

    /// Advisory lock file guarding against a second instance
    #[serde(default = "default_lock_path_buf")]
    pub lock_path: PathBuf,
}

fn default_log_path_buf() -> PathBuf {
    PathBuf::from(default_log_path())
}

fn default_lock_path_buf() -> PathBuf {
    PathBuf::from(default_lock_path())
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_path: default_log_path_buf(),
            flush_interval_secs: default_flush_interval_secs(),
            poll_timeout_ms: default_poll_timeout_ms(),
            verbose: default_verbose(),
            roots: Vec::new(),
            lock_path: default_lock_path_buf(),
        }
    }
}

impl MonitorConfig {
    /// Interval between timed flushes
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs)
    }

    /// Maximum time a single wait for events may block
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validates the configuration before a session starts
    pub fn validate(&self) -> Result<()> {
        if self.flush_interval_secs == 0 {
            return Err(Error::config(
                "flush_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.poll_timeout_ms == 0 {
            return Err(Error::config(
                "poll_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.roots.is_empty() {
            return Err(Error::config(
                "at least one root path must be given".to_string(),
            ));
        }

        if self.log_path.as_os_str().is_empty() {
            return Err(Error::config("log_path must not be empty".to_string()));
        }

        Ok(())
    }
}
