//! Integration tests for the archiver
//!
//! These tests use wiremock to serve pages and resources over HTTP and
//! tempfile for scan roots and output directories.

mod fetch_tests;
mod site_tests;
mod system_tests;

use snapshot_archiver::config::Config;
use snapshot_archiver::limiter::{FixedProbe, ManualClock, ResourceBudget, ResourceLimiter};
use snapshot_archiver::Archiver;
use std::sync::Arc;

/// Default configuration usable against a local mock server and temp dirs
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.security.restricted_paths.clear();
    config.security.warn_on_http = false;
    config.download.retry_attempts = 0;
    config.download.timeout_seconds = 5;
    config
}

/// Limiter whose probes always report an idle process
pub fn idle_limiter(config: &Config) -> Arc<ResourceLimiter> {
    Arc::new(ResourceLimiter::with_parts(
        ResourceBudget::from_config(config),
        Arc::new(FixedProbe::default()),
        Arc::new(ManualClock::new()),
    ))
}

/// Archiver whose probes always report an idle process
pub fn idle_archiver(config: Config) -> Archiver {
    Archiver::with_parts(
        Arc::new(config),
        Arc::new(FixedProbe::default()),
        Arc::new(ManualClock::new()),
    )
}
