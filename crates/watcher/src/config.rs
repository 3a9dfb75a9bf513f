//! Configuration types for the dispatcher
//!
//! This module provides the immutable settings that drive one dispatch loop:
//! how long a wait may block, how often pending paths are flushed, and how
//! large the raw read buffer is.

use crate::events::EVENT_HEADER_LEN;
use pathtrail_core::config::MonitorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Immutable configuration for the dispatch loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Interval between timed flushes in milliseconds (default: 60s)
    pub flush_interval_ms: u64,
    /// Upper bound on a single wait in milliseconds (default: 1000ms)
    pub poll_timeout_ms: u64,
    /// Size of the raw event buffer in bytes (default: room for 1024 short-named events)
    pub buffer_len: usize,
}

impl DispatchConfig {
    /// Create configuration from builder
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }

    /// Get the flush interval
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Get the bounded wait duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 60_000,
            poll_timeout_ms: 1000,
            buffer_len: 1024 * (EVENT_HEADER_LEN + 16),
        }
    }
}

impl From<&MonitorConfig> for DispatchConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self::builder()
            .flush_interval(config.flush_interval())
            .poll_timeout(config.poll_timeout())
            .build()
    }
}

/// Builder for DispatchConfig
#[derive(Debug, Default)]
pub struct DispatchConfigBuilder {
    config: DispatchConfig,
}

impl DispatchConfigBuilder {
    /// Set the flush interval
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.config.flush_interval_ms = saturating_millis(interval);
        self
    }

    /// Set the bounded wait duration
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.config.poll_timeout_ms = saturating_millis(timeout);
        self
    }

    /// Set the raw buffer size; never smaller than one maximal record
    pub fn buffer_len(mut self, len: usize) -> Self {
        self.config.buffer_len = len.max(EVENT_HEADER_LEN + 256);
        self
    }

    /// Build the configuration
    pub fn build(self) -> DispatchConfig {
        self.config
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
