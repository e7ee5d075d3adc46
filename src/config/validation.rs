//! Configuration validation

use crate::config::{Config, SourceConfig};
use crate::{ConfigError, ConfigResult};

/// Validates a parsed configuration
pub fn validate_config(config: &Config) -> ConfigResult<()> {
    validate_source("city", &config.city)?;
    validate_source("federation", &config.federation)?;

    if config.discovery.empty_streak_threshold == 0 {
        return Err(ConfigError::Validation(
            "discovery.empty-streak-threshold must be at least 1".to_string(),
        ));
    }
    if config.discovery.bootstrap_start == 0 {
        return Err(ConfigError::Validation(
            "discovery.bootstrap-start must be at least 1".to_string(),
        ));
    }
    if config.discovery.bootstrap_step == 0 {
        return Err(ConfigError::Validation(
            "discovery.bootstrap-step must be at least 1".to_string(),
        ));
    }
    if config.updater.check_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "updater.check-interval-secs must be at least 1".to_string(),
        ));
    }
    if config.http.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "http.timeout-secs must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn validate_source(name: &str, source: &SourceConfig) -> ConfigResult<()> {
    let url = source.parsed_base_url()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "{}.base-url must be http or https, got {}",
            name,
            url.scheme()
        )));
    }
    Ok(())
}
