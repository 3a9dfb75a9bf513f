//! Core types for the pathtrail access monitor
//!
//! This crate provides the foundational pieces shared by the watcher and the
//! command-line binary:
//!
//! - **Configuration**: layered session configuration and validation
//! - **Error handling**: unified error types
//!

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;

// Re-export main types for convenience
pub use config::MonitorConfig;
pub use error::{Error, Result, ResultExt};
