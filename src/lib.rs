//! Volleysync: an incremental scraper for two volleyball data sources
//!
//! This crate keeps a local SQLite store eventually consistent with two
//! independent, ID-addressed external sources: a flat city match archive and a
//! season-structured federation site. The interesting part is not HTML
//! extraction but deciding what to fetch next (gap backfill, frontier
//! scanning, bounded ceiling search) while staying interruptible, resumable
//! and rate-limited.

pub mod config;
pub mod discovery;
pub mod fetch;
pub mod jobs;
pub mod pipeline;
pub mod resolver;
pub mod storage;
pub mod updater;

use thiserror::Error;

/// Main error type for volleysync operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] fetch::FetchError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Job error: {0}")]
    Job(#[from] jobs::JobError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for volleysync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use fetch::{FetchError, Outcome};
pub use jobs::{JobController, JobMode, JobSnapshot, JobState};
pub use storage::{MatchStatus, Source};
