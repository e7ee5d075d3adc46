//! Configuration type definitions

use crate::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// The flat city match archive
    pub city: SourceConfig,

    /// The season-structured federation site
    pub federation: SourceConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub updater: UpdaterConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// One external source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct SourceConfig {
    /// Base URL all page paths are joined against
    pub base_url: String,

    /// Minimum gap between two requests to this source
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl SourceConfig {
    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    /// The base URL with a guaranteed trailing slash, so joins append
    /// instead of replacing the last path segment
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.base_url.clone();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Identifier discovery tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DiscoveryConfig {
    /// Consecutive empty answers that end a frontier scan
    #[serde(default = "default_empty_streak_threshold")]
    pub empty_streak_threshold: u32,

    /// First identifier the bootstrap ceiling search probes
    #[serde(default = "default_bootstrap_start")]
    pub bootstrap_start: u32,

    /// Initial stride of the ceiling search's growth phase
    #[serde(default = "default_bootstrap_step")]
    pub bootstrap_step: u32,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            empty_streak_threshold: default_empty_streak_threshold(),
            bootstrap_start: default_bootstrap_start(),
            bootstrap_step: default_bootstrap_step(),
        }
    }
}

/// Auto-updater timing
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct UpdaterConfig {
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    #[serde(default = "default_warmup_delay_secs")]
    pub warmup_delay_secs: u64,
}

impl UpdaterConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_secs(self.warmup_delay_secs)
    }
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval_secs(),
            warmup_delay_secs: default_warmup_delay_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_database_path() -> PathBuf {
    PathBuf::from("volleysync.db")
}

fn default_min_request_interval_ms() -> u64 {
    1_500
}

fn default_empty_streak_threshold() -> u32 {
    50
}

fn default_bootstrap_start() -> u32 {
    50_000
}

fn default_bootstrap_step() -> u32 {
    1_000
}

fn default_check_interval_secs() -> u64 {
    3_600
}

fn default_warmup_delay_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    format!("volleysync/{}", env!("CARGO_PKG_VERSION"))
}

fn default_timeout_secs() -> u64 {
    30
}
