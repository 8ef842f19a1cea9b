//! Configuration module for the snapshot archiver
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key is optional; missing sections fall back to defaults.
//!
//! # Example
//!
//! ```no_run
//! use snapshot_archiver::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("archiver.toml")).unwrap();
//! println!("Bandwidth ceiling: {}", config.limits.max_bandwidth_bytes_per_sec);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DownloadConfig, EncodingConfig, LimitsConfig, OutputConfig, ScanConfig,
    SecurityConfig,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, load_or_default, parse_config,
};
