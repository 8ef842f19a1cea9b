//! File store error types and the file-lock capability
//!
//! Locking is advisory and non-blocking. Platform backends live in `lock.rs`;
//! everything above them talks to the [`FileLock`] trait only.

use std::fs::File;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during file store operations
#[derive(Debug, Error)]
pub enum FileStoreError {
    #[error("Path is restricted: {0}")]
    Restricted(PathBuf),

    #[error("File is locked by another writer: {0}")]
    Locked(PathBuf),

    #[error("Insufficient resources to write {path}: {reason}")]
    InsufficientSpace { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to move temporary file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Result type for file store operations
pub type StoreResult<T> = Result<T, FileStoreError>;

/// Exclusive advisory lock on an open file
///
/// Implementations must not block: a lock held elsewhere is reported as
/// `Ok(false)`.
pub trait FileLock: Send + Sync {
    /// Tries to take an exclusive lock on `file`
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Lock acquired
    /// * `Ok(false)` - Lock held by someone else
    /// * `Err(io::Error)` - The platform call failed
    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool>;

    /// Releases a lock taken by [`FileLock::try_lock_exclusive`]
    fn unlock(&self, file: &File) -> io::Result<()>;
}
