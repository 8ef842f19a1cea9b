//! Platform file-lock backends

use super::traits::FileLock;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// `flock(2)` based locking
#[cfg(unix)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformLock;

#[cfg(unix)]
impl FileLock for PlatformLock {
    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool> {
        use rustix::fs::{flock, FlockOperation};

        match flock(file, FlockOperation::NonBlockingLockExclusive) {
            Ok(()) => Ok(true),
            Err(rustix::io::Errno::WOULDBLOCK) => Ok(false),
            Err(errno) => Err(errno.into()),
        }
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        rustix::fs::flock(file, rustix::fs::FlockOperation::Unlock).map_err(Into::into)
    }
}

/// `LockFileEx` based locking
#[cfg(windows)]
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformLock;

#[cfg(windows)]
impl FileLock for PlatformLock {
    fn try_lock_exclusive(&self, file: &File) -> io::Result<bool> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
        use windows_sys::Win32::Storage::FileSystem::{
            LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
        };
        use windows_sys::Win32::System::IO::OVERLAPPED;

        let handle = file.as_raw_handle() as HANDLE;
        let mut overlapped: OVERLAPPED = unsafe { std::mem::zeroed() };
        let ok = unsafe {
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                u32::MAX,
                u32::MAX,
                &mut overlapped,
            )
        };
        if ok != 0 {
            return Ok(true);
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32) {
            Ok(false)
        } else {
            Err(err)
        }
    }

    fn unlock(&self, file: &File) -> io::Result<()> {
        use std::os::windows::io::AsRawHandle;
        use windows_sys::Win32::Foundation::HANDLE;
        use windows_sys::Win32::Storage::FileSystem::UnlockFile;

        let handle = file.as_raw_handle() as HANDLE;
        let ok = unsafe { UnlockFile(handle, 0, 0, u32::MAX, u32::MAX) };
        if ok != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }
}

/// Path of the lock file guarding `path`
pub fn lock_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// A held lock on `<path>.lock`
///
/// Dropping the guard releases the lock. The lock file stays on disk: removing
/// it would let a new opener lock a fresh inode while an old handle still
/// holds the lock on the unlinked one.
pub struct LockGuard {
    file: File,
    path: PathBuf,
    backend: Arc<dyn FileLock>,
}

impl LockGuard {
    /// Tries to lock `target`; `Ok(None)` when another holder has it
    pub fn acquire(target: &Path, backend: Arc<dyn FileLock>) -> io::Result<Option<Self>> {
        let path = lock_path_for(target);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;

        if !backend.try_lock_exclusive(&file)? {
            return Ok(None);
        }

        Ok(Some(Self {
            file,
            path,
            backend,
        }))
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.backend.unlock(&self.file) {
            tracing::warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_for() {
        assert_eq!(
            lock_path_for(Path::new("/tmp/out.yaml")),
            PathBuf::from("/tmp/out.yaml.lock")
        );
    }

    #[test]
    fn test_second_lock_fails_fast() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.yaml");
        let backend: Arc<dyn FileLock> = Arc::new(PlatformLock);

        let first = LockGuard::acquire(&target, backend.clone()).unwrap();
        assert!(first.is_some());
        assert!(lock_path_for(&target).exists());

        // A second handle on the same lock file conflicts with the first
        let second = LockGuard::acquire(&target, backend.clone()).unwrap();
        assert!(second.is_none());

        drop(first);
        assert!(lock_path_for(&target).exists());
        assert!(LockGuard::acquire(&target, backend).unwrap().is_some());
    }

    #[test]
    fn test_lock_file_kept_across_holders() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("doc.yaml");
        let backend: Arc<dyn FileLock> = Arc::new(PlatformLock);

        let waiting = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path_for(&target))
            .unwrap();
        drop(LockGuard::acquire(&target, backend.clone()).unwrap());

        // A handle opened before the release still contends with new holders
        assert!(backend.try_lock_exclusive(&waiting).unwrap());
        assert!(LockGuard::acquire(&target, backend.clone()).unwrap().is_none());
        backend.unlock(&waiting).unwrap();
        assert!(LockGuard::acquire(&target, backend).unwrap().is_some());
    }
}
