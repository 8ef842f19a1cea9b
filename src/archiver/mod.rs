//! Archive orchestration
//!
//! This module drives a complete run in either mode:
//! - site: fetch one page, download its images and videos, embed its
//!   stylesheets and scripts, and write `site_data.yaml`
//! - system: snapshot a directory tree and the processed contents of its
//!   files into one `system_*.yaml` document
//!
//! Each run walks the [`RunStage`](crate::state::RunStage) state machine and
//! reports weighted progress through an optional callback.

mod progress;
mod site;
mod system;

pub use progress::{ProgressCallback, ProgressPlan, ProgressStep};

use crate::config::Config;
use crate::content::ContentProcessor;
use crate::limiter::{
    Clock, ProcessProbe, ResourceBudget, ResourceLimiter, ResourceProbe, SystemClock,
};
use crate::output::ArchiveStatistics;
use crate::state::RunTracker;
use crate::storage::{FileStore, PlatformLock};
use crate::{Result, SnapshotError};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// What a successful run produced
#[derive(Debug, Clone)]
pub struct ArchiveOutcome {
    /// The written YAML document
    pub path: PathBuf,
    pub statistics: ArchiveStatistics,
}

/// Runs archive jobs against one configuration
///
/// Configuration, limiter and file store are built once and shared by
/// every task of a run.
pub struct Archiver {
    config: Arc<Config>,
    limiter: Arc<ResourceLimiter>,
    processor: ContentProcessor,
    store: Arc<FileStore>,
    probe: Arc<dyn ResourceProbe>,
    clock: Arc<dyn Clock>,
    progress: Option<ProgressCallback>,
}

impl Archiver {
    pub fn new(config: Arc<Config>) -> Self {
        Self::with_parts(config, Arc::new(ProcessProbe::new()), Arc::new(SystemClock))
    }

    /// Creates an archiver with explicit probe and clock implementations
    pub fn with_parts(
        config: Arc<Config>,
        probe: Arc<dyn ResourceProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limiter = ResourceLimiter::with_parts(
            ResourceBudget::from_config(&config),
            probe.clone(),
            clock.clone(),
        );
        let store = FileStore::with_parts(&config, probe.clone(), Arc::new(PlatformLock));

        Self {
            processor: ContentProcessor::new(&config),
            limiter: Arc::new(limiter),
            store: Arc::new(store),
            config,
            probe,
            clock,
            progress: None,
        }
    }

    /// Reports cumulative progress (0 to 100) to `callback`
    pub fn on_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    /// Archives the page at `url` and its resources into `output_dir`
    ///
    /// # Returns
    ///
    /// * `Ok(ArchiveOutcome)` - The document was written
    /// * `Err(SnapshotError)` - Invalid input, unreachable page, or a failed write
    pub async fn archive_site(&self, url: &str, output_dir: &Path) -> Result<ArchiveOutcome> {
        tracing::info!("Archiving site {}", url);
        let mut tracker = RunTracker::new();
        let mut progress = ProgressPlan::site(self.progress.clone());
        let result = self
            .run_site(url, output_dir, &mut tracker, &mut progress)
            .await;
        finish(&mut tracker, result)
    }

    /// Archives the directory `root` into `output_dir`
    ///
    /// `pattern` optionally restricts file contents to names matching a glob.
    pub async fn archive_system(
        &self,
        root: &Path,
        output_dir: &Path,
        pattern: Option<&str>,
    ) -> Result<ArchiveOutcome> {
        tracing::info!("Archiving directory {}", root.display());
        let mut tracker = RunTracker::new();
        let mut progress = ProgressPlan::system(self.progress.clone());
        let result = self
            .run_system(root, output_dir, pattern, &mut tracker, &mut progress)
            .await;
        finish(&mut tracker, result)
    }

    /// Writes `content` to `path` through the file store off the async runtime
    async fn persist(&self, path: PathBuf, content: Vec<u8>) -> Result<()> {
        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.safe_write(&path, &content)).await??;
        Ok(())
    }
}

/// Marks the run aborted if it failed
fn finish(tracker: &mut RunTracker, result: Result<ArchiveOutcome>) -> Result<ArchiveOutcome> {
    if let Err(e) = &result {
        tracing::error!("Archive run failed: {}", e);
        tracker.abort();
    }
    result
}

/// Reads back a system document written by [`Archiver::archive_system`]
pub fn load_system_snapshot(store: &FileStore, path: &Path) -> Result<serde_yaml::Value> {
    let bytes = store
        .safe_read(path)
        .ok_or_else(|| SnapshotError::InvalidInput(format!("cannot read {}", path.display())))?;
    Ok(serde_yaml::from_slice(&bytes)?)
}
