//! Single-writer lock over a store
//!
//! Advisory file locking using fd-lock. A second sync on the same store
//! fails fast instead of interleaving shard writes.

use super::state::ResumeError;
use fd_lock::{RwLock, RwLockWriteGuard};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Lock file wrapper; the lock is held while the returned guard lives
pub struct SyncLock {
    path: PathBuf,
    lock: RwLock<File>,
}

impl SyncLock {
    /// Open (or create) the lock file at `path`
    pub fn open(path: &Path) -> Result<Self, ResumeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

        Ok(Self {
            path: path.to_path_buf(),
            lock: RwLock::new(file),
        })
    }

    /// Take the exclusive lock without blocking
    ///
    /// Returns [`ResumeError::AlreadyRunning`] if another process holds it.
    pub fn try_acquire(&mut self) -> Result<RwLockWriteGuard<'_, File>, ResumeError> {
        let path = self.path.display().to_string();
        self.lock.try_write().map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                ResumeError::AlreadyRunning(path)
            } else {
                ResumeError::LockError(format!("Failed to acquire lock: {e}"))
            }
        })
    }
}
