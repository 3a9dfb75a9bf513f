//! Library interface for the pathtrail CLI
//!
//! This module exposes the instance lock and session runner for integration
//! testing while keeping argument parsing and signal handling in main.rs.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod lock;
pub mod session;

pub use lock::InstanceLock;
pub use session::{run_session, summarize};
