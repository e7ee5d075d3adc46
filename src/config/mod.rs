//! Configuration loading and validation
//!
//! TOML with kebab-case keys; every tuning knob has a documented default so a
//! minimal config only names the two source URLs.

mod parser;
mod types;
mod validation;

pub use parser::load_config;
pub use types::{
    Config, DatabaseConfig, DiscoveryConfig, HttpConfig, SourceConfig, UpdaterConfig,
};
pub use validation::validate_config;
