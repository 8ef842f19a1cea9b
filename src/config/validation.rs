use crate::config::types::{
    Config, DownloadConfig, EncodingConfig, LimitsConfig, OutputConfig, ScanConfig,
    SecurityConfig,
};
use crate::ConfigError;
use globset::Glob;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_download_config(&config.download)?;
    validate_limits_config(&config.limits)?;
    validate_scan_config(&config.scan)?;
    validate_security_config(&config.security)?;
    validate_encoding_config(&config.encoding)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> Result<(), ConfigError> {
    if config.max_concurrent < 1 || config.max_concurrent > 100 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent must be between 1 and 100, got {}",
            config.max_concurrent
        )));
    }

    if config.timeout_seconds < 1 {
        return Err(ConfigError::Validation(
            "timeout_seconds must be >= 1".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates resource ceilings
fn validate_limits_config(config: &LimitsConfig) -> Result<(), ConfigError> {
    if config.max_connections < 1 {
        return Err(ConfigError::Validation(format!(
            "max_connections must be >= 1, got {}",
            config.max_connections
        )));
    }

    if !(config.max_cpu_percent > 0.0 && config.max_cpu_percent <= 100.0) {
        return Err(ConfigError::Validation(format!(
            "max_cpu_percent must be in (0, 100], got {}",
            config.max_cpu_percent
        )));
    }

    if config.max_memory_bytes == 0 {
        return Err(ConfigError::Validation(
            "max_memory_bytes must be > 0".to_string(),
        ));
    }

    if config.max_bandwidth_bytes_per_sec == 0 {
        return Err(ConfigError::Validation(
            "max_bandwidth_bytes_per_sec must be > 0".to_string(),
        ));
    }

    Ok(())
}

/// Validates scan configuration, including every exclusion glob
fn validate_scan_config(config: &ScanConfig) -> Result<(), ConfigError> {
    if config.batch_size < 1 {
        return Err(ConfigError::Validation(format!(
            "batch_size must be >= 1, got {}",
            config.batch_size
        )));
    }

    if config.min_files_per_second < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min_files_per_second cannot be negative, got {}",
            config.min_files_per_second
        )));
    }

    for dir in &config.excluded_directories {
        if dir.is_empty() || dir.contains('/') || dir.contains('\\') {
            return Err(ConfigError::InvalidPattern(format!(
                "Excluded directory must be a plain name, got '{}'",
                dir
            )));
        }
    }

    for pattern in &config.excluded_files {
        Glob::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid file pattern '{}': {}", pattern, e))
        })?;
    }

    Ok(())
}

/// Validates the protocol allow-list
fn validate_security_config(config: &SecurityConfig) -> Result<(), ConfigError> {
    if config.allowed_protocols.is_empty() {
        return Err(ConfigError::Validation(
            "allowed_protocols cannot be empty".to_string(),
        ));
    }

    for protocol in &config.allowed_protocols {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::Validation(format!(
                "Only http and https protocols are supported, got '{}'",
                protocol
            )));
        }
    }

    Ok(())
}

/// Validates encoding labels and the confidence threshold
fn validate_encoding_config(config: &EncodingConfig) -> Result<(), ConfigError> {
    for label in [&config.default, &config.fallback] {
        if encoding_rs::Encoding::for_label(label.as_bytes()).is_none() {
            return Err(ConfigError::Validation(format!(
                "Unknown encoding label '{}'",
                label
            )));
        }
    }

    if !(0.0..=1.0).contains(&config.min_confidence) {
        return Err(ConfigError::Validation(format!(
            "min_confidence must be between 0 and 1, got {}",
            config.min_confidence
        )));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.default_dir.is_empty() {
        return Err(ConfigError::Validation(
            "default_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}
