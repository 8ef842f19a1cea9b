//! HTTP client construction

use crate::config::DownloadConfig;
use reqwest::{redirect::Policy, Client};
use std::time::Duration;

/// Most redirects followed for one request
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The `[download]` configuration section
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use snapshot_archiver::config::DownloadConfig;
/// use snapshot_archiver::fetcher::build_http_client;
///
/// let client = build_http_client(&DownloadConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &DownloadConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_secs(config.timeout_seconds);

    Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}
