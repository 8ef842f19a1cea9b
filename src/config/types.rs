use serde::{Deserialize, Serialize};

/// Main configuration structure for the archiver
///
/// Every section has defaults, so an empty file (or no file at all) yields a
/// usable configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub download: DownloadConfig,
    pub limits: LimitsConfig,
    pub scan: ScanConfig,
    pub security: SecurityConfig,
    pub encoding: EncodingConfig,
    pub output: OutputConfig,
}

/// Network download behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DownloadConfig {
    /// Maximum number of downloads in flight at once
    pub max_concurrent: usize,

    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// Extra attempts made after a timeout or connection failure
    pub retry_attempts: u32,

    /// Delay between retry attempts (milliseconds)
    pub retry_delay_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            timeout_seconds: 30,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            user_agent: concat!("snapshot-archiver/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Resource ceilings applied to a run
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LimitsConfig {
    /// Resident memory ceiling for the process (bytes)
    pub max_memory_bytes: u64,

    /// CPU usage ceiling for the process (percent)
    pub max_cpu_percent: f32,

    /// Bytes accepted per sliding one-second window
    pub max_bandwidth_bytes_per_sec: u64,

    /// Maximum number of open connection slots
    pub max_connections: usize,

    /// Largest file or resource that will be read (bytes)
    pub max_file_size: u64,

    /// Maximum directory depth below the scan root (unlimited when absent)
    pub max_depth: Option<usize>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_memory_bytes: 1024 * 1024 * 1024,
            max_cpu_percent: 80.0,
            max_bandwidth_bytes_per_sec: 10 * 1024 * 1024,
            max_connections: 10,
            max_file_size: 10 * 1024 * 1024,
            max_depth: None,
        }
    }
}

/// Filesystem scanning behavior
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ScanConfig {
    /// Minimum scan throughput; slower scans are aborted (0 disables the check)
    pub min_files_per_second: f64,

    /// Seconds of scanning before the throughput floor is enforced
    pub rate_grace_seconds: u64,

    /// Resident memory ceiling while scanning (bytes)
    pub max_memory_bytes: u64,

    /// Include dot-prefixed files and directories
    pub include_hidden: bool,

    /// Number of files processed together before statistics are updated
    pub batch_size: usize,

    /// Record non-text files as skipped instead of embedding them
    pub skip_binary: bool,

    /// Directory names that are never descended into
    pub excluded_directories: Vec<String>,

    /// Glob patterns for file names that are never yielded
    pub excluded_files: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            min_files_per_second: 10.0,
            rate_grace_seconds: 5,
            max_memory_bytes: 2 * 1024 * 1024 * 1024,
            include_hidden: false,
            batch_size: 100,
            skip_binary: true,
            excluded_directories: [
                ".git",
                "__pycache__",
                "venv",
                "node_modules",
                "dist",
                "build",
                "target",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            excluded_files: [
                ".DS_Store",
                "Thumbs.db",
                "*.pyc",
                "*.pyo",
                "*.pyd",
                ".env",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

/// Access restrictions
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SecurityConfig {
    /// URL schemes that may be fetched
    pub allowed_protocols: Vec<String>,

    /// Log a warning when a plain-http URL is fetched
    pub warn_on_http: bool,

    /// Absolute path prefixes that are never read or written
    pub restricted_paths: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_protocols: vec!["https".to_string(), "http".to_string()],
            warn_on_http: true,
            restricted_paths: default_restricted_paths(),
        }
    }
}

#[cfg(windows)]
fn default_restricted_paths() -> Vec<String> {
    ["C:\\Windows", "C:\\Program Files", "C:\\Program Files (x86)"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[cfg(not(windows))]
fn default_restricted_paths() -> Vec<String> {
    ["/etc", "/var", "/usr/bin", "/usr/sbin", "/usr/local/bin"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Text encoding handling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EncodingConfig {
    /// Encoding that text is converted to
    pub default: String,

    /// Encoding reported when detection confidence is too low
    pub fallback: String,

    /// Detection confidence below which the fallback is used
    pub min_confidence: f32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            default: "utf-8".to_string(),
            fallback: "utf-8".to_string(),
            min_confidence: 0.7,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Directory snapshots are written to when none is given
    pub default_dir: String,

    /// Number of backups kept when an existing file is overwritten
    pub max_backups: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: "./saved_content".to_string(),
            max_backups: 5,
        }
    }
}
