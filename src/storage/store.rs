//! Validated, locked, backed-up file access

use super::lock::{LockGuard, PlatformLock};
use super::naming::{backup_path, existing_backups};
use super::traits::{FileLock, FileStoreError, StoreResult};
use crate::config::Config;
use crate::limiter::{ProcessProbe, ResourceProbe};
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;

/// Local file access used for every artifact the archiver writes
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place while `<target>.lock` is held, so readers never observe a
/// partial document.
pub struct FileStore {
    restricted_paths: Vec<PathBuf>,
    max_backups: usize,
    max_memory_bytes: u64,
    probe: Arc<dyn ResourceProbe>,
    lock: Arc<dyn FileLock>,
}

impl FileStore {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(config, Arc::new(ProcessProbe::new()), Arc::new(PlatformLock))
    }

    /// Creates a store with explicit probe and lock backends
    pub fn with_parts(
        config: &Config,
        probe: Arc<dyn ResourceProbe>,
        lock: Arc<dyn FileLock>,
    ) -> Self {
        Self {
            restricted_paths: config
                .security
                .restricted_paths
                .iter()
                .map(PathBuf::from)
                .collect(),
            max_backups: config.output.max_backups,
            max_memory_bytes: config.limits.max_memory_bytes,
            probe,
            lock,
        }
    }

    fn is_restricted(&self, path: &Path) -> bool {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            match std::env::current_dir() {
                Ok(cwd) => cwd.join(path),
                Err(_) => path.to_path_buf(),
            }
        };
        self.restricted_paths
            .iter()
            .any(|restricted| absolute.starts_with(restricted))
    }

    /// Checks `path` against the restricted prefixes and creates its missing
    /// parent directories
    ///
    /// # Returns
    ///
    /// * `Ok(())` - The path may be written
    /// * `Err(FileStoreError::Restricted)` - The path lies under a restricted prefix
    /// * `Err(FileStoreError::Io)` - Parent directories could not be created
    pub fn validate_path(&self, path: &Path) -> StoreResult<()> {
        if self.is_restricted(path) {
            tracing::warn!("Access to restricted path denied: {}", path.display());
            return Err(FileStoreError::Restricted(path.to_path_buf()));
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn check_resources(&self, path: &Path, needed: u64) -> StoreResult<()> {
        let used = self.probe.memory_bytes();
        if used >= self.max_memory_bytes {
            return Err(FileStoreError::InsufficientSpace {
                path: path.to_path_buf(),
                reason: format!("memory usage {} exceeds limit {}", used, self.max_memory_bytes),
            });
        }

        if let Some(available) = available_space(path) {
            if available < needed {
                return Err(FileStoreError::InsufficientSpace {
                    path: path.to_path_buf(),
                    reason: format!("{} bytes free, {} needed", available, needed),
                });
            }
        }
        Ok(())
    }

    /// Atomically replaces `path` with `content`
    ///
    /// An existing target is kept as a timestamped backup; at most
    /// `max_backups` backups are retained, oldest removed first. Fails with
    /// [`FileStoreError::Locked`] if another writer holds the lock.
    pub fn safe_write(&self, path: &Path, content: &[u8]) -> StoreResult<()> {
        self.validate_path(path)?;
        self.check_resources(path, content.len() as u64)?;

        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let mut temp = NamedTempFile::new_in(&dir)?;
        temp.write_all(content)?;
        temp.as_file().sync_all()?;

        let _guard = LockGuard::acquire(path, self.lock.clone())?
            .ok_or_else(|| FileStoreError::Locked(path.to_path_buf()))?;

        if path.exists() {
            self.backup(path)?;
        }

        temp.persist(path)?;
        tracing::debug!("Wrote {} bytes to {}", content.len(), path.display());
        Ok(())
    }

    fn backup(&self, path: &Path) -> StoreResult<()> {
        if self.max_backups == 0 {
            return Ok(());
        }

        let backup = backup_path(path, Local::now());
        fs::copy(path, &backup)?;
        tracing::debug!("Backed up {} to {}", path.display(), backup.display());

        let backups = existing_backups(path);
        let excess = backups.len().saturating_sub(self.max_backups);
        for old in backups.into_iter().take(excess) {
            if let Err(e) = fs::remove_file(&old) {
                tracing::warn!("Failed to remove old backup {}: {}", old.display(), e);
            }
        }
        Ok(())
    }

    /// Reads `path` under its lock
    ///
    /// Returns `None` when the path is restricted, missing, locked by a
    /// writer, or unreadable.
    pub fn safe_read(&self, path: &Path) -> Option<Vec<u8>> {
        if self.is_restricted(path) {
            tracing::warn!("Access to restricted path denied: {}", path.display());
            return None;
        }
        if !path.is_file() {
            return None;
        }

        let _guard = match LockGuard::acquire(path, self.lock.clone()) {
            Ok(Some(guard)) => guard,
            Ok(None) => {
                tracing::warn!("File is locked: {}", path.display());
                return None;
            }
            Err(e) => {
                tracing::error!("Failed to lock {}: {}", path.display(), e);
                return None;
            }
        };

        match fs::read(path) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// Free space on the disk holding `path`, if it can be determined
fn available_space(path: &Path) -> Option<u64> {
    let dir = path.parent().unwrap_or(path);
    let dir = fs::canonicalize(dir).ok()?;
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| dir.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
}
