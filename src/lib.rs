//! Snapshot Archiver: resource-bounded web page and directory snapshots
//!
//! This crate archives either a web page with its linked assets or a
//! file-system subtree into a single YAML document, while keeping memory,
//! CPU, bandwidth and connection usage within configured budgets.

pub mod archiver;
pub mod config;
pub mod content;
pub mod fetcher;
pub mod limiter;
pub mod output;
pub mod state;
pub mod storage;
pub mod traverse;
pub mod url;

use thiserror::Error;

/// Main error type for archive runs
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] fetcher::FetchFailure),

    #[error("Could not fetch page: {0}")]
    PageUnavailable(String),

    #[error("File store error: {0}")]
    FileStore(#[from] storage::FileStoreError),

    #[error("Document serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::RunStage,
        to: state::RunStage,
    },
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

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Protocol not allowed: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,
}

/// Result type alias for archive operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use archiver::{load_system_snapshot, ArchiveOutcome, Archiver};
pub use config::Config;
pub use state::RunStage;
