//! Configuration file loading

use crate::config::{validate_config, Config};
use crate::{ConfigError, ConfigResult};
use std::path::Path;
use tracing::debug;

/// Loads and validates a TOML configuration file
///
/// # Arguments
///
/// * `path` - Path to the configuration file
pub fn load_config(path: &Path) -> ConfigResult<Config> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    validate_config(&config)?;
    debug!(path = %path.display(), "configuration loaded");
    Ok(config)
}
