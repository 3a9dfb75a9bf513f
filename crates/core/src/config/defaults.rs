//! Default values and functions for configuration

pub(crate) const DEFAULT_LOG_PATH: &str = "file_monitor.log";
pub(crate) const DEFAULT_LOCK_PATH: &str = "/var/run/lock/pathtrail.lock";
pub(crate) const DEFAULT_ENV_PREFIX: &str = "PATHTRAIL";

pub(crate) fn default_log_path() -> String {
    DEFAULT_LOG_PATH.to_string()
}

pub(crate) fn default_lock_path() -> String {
    DEFAULT_LOCK_PATH.to_string()
}

pub(crate) fn default_flush_interval_secs() -> u64 {
    60
}

pub(crate) fn default_poll_timeout_ms() -> u64 {
    1000
}

pub(crate) fn default_verbose() -> bool {
    false
}
