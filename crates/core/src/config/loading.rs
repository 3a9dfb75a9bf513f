//! Configuration loading from files and environment variables

use crate::error::{Error, Result};
use config::{
    builder::DefaultState, Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment,
    File, FileFormat,
};
use std::path::Path;
use tracing::debug;

use super::defaults::*;
use super::MonitorConfig;

/// Helper to set a config default with consistent error mapping
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("Failed to set {key} default: {e}")))
}

fn builder_with_defaults() -> Result<LibConfigBuilder<DefaultState>> {
    let builder = ConfigLib::builder();
    let builder = set_config_default(builder, "log_path", default_log_path())?;
    let builder = set_config_default(
        builder,
        "flush_interval_secs",
        default_flush_interval_secs() as i64,
    )?;
    let builder =
        set_config_default(builder, "poll_timeout_ms", default_poll_timeout_ms() as i64)?;
    let builder = set_config_default(builder, "verbose", default_verbose())?;
    let builder = set_config_default(builder, "roots", Vec::<String>::new())?;
    set_config_default(builder, "lock_path", default_lock_path())
}

fn build(builder: LibConfigBuilder<DefaultState>) -> Result<MonitorConfig> {
    let config = builder
        .build()
        .map_err(|e| Error::config(format!("Failed to build config: {e}")))?;

    config
        .try_deserialize()
        .map_err(|e| Error::config(format!("Failed to deserialize config: {e}")))
}

impl MonitorConfig {
    /// Loads configuration with environment variable overrides
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file, when a path is given (a missing file is an error)
    /// 3. Environment variables (`PATHTRAIL_*`, e.g. `PATHTRAIL_FLUSH_INTERVAL_SECS=30`)
    ///
    /// `PATHTRAIL_ROOTS` accepts a comma-separated list.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        Self::load_with_env_prefix(config_path, DEFAULT_ENV_PREFIX)
    }

    pub(crate) fn load_with_env_prefix(config_path: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = builder_with_defaults()?;

        if let Some(path) = config_path {
            if path.exists() {
                debug!("Loading configuration from {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Toml));
            } else {
                return Err(Error::config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(prefix)
                .prefix_separator("_")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("roots"),
        );

        build(builder)
    }

    /// Creates a config from a TOML string (useful for testing)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let builder = builder_with_defaults()?.add_source(File::from_str(content, FileFormat::Toml));
        build(builder)
    }
}
