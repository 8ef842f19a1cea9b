//! Storage module for persisting archive artifacts
//!
//! This module handles all local file output for the archiver, including:
//! - restricted-path validation and parent directory creation
//! - atomic writes through a temporary file in the target directory
//! - timestamped backups of replaced files, with rotation
//! - advisory exclusive locking keyed by the target path
//! - file name sanitization and collision-free naming

mod lock;
mod naming;
mod store;
mod traits;

pub use lock::{lock_path_for, LockGuard, PlatformLock};
pub use naming::{backup_path, existing_backups, sanitize_filename, timestamped_name, unique_path};
pub use store::FileStore;
pub use traits::{FileLock, FileStoreError, StoreResult};
