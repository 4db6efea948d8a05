//! Exclusive lock serializing drains of one queue directory.
//!
//! Lock strategy:
//! - `lockfile` inside the queue directory is locked with an advisory OS
//!   file lock (flock), exclusive and blocking.
//! - The lock is held for the duration of one drain and released when the
//!   guard drops, on every exit path.
//! - The lockfile itself is never deleted. Removing it would let a waiter
//!   and a newcomer lock two different inodes.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Name of the lockfile inside the queue directory
pub const LOCK_FILE: &str = "lockfile";

/// Mutual exclusion between drains of the same queue.
///
/// `acquire` blocks until the lock is free; dropping the guard releases it.
pub trait QueueLock {
    /// Held while the lock is owned
    type Guard;

    /// Block until the lock is held
    fn acquire(&self) -> Result<Self::Guard>;
}

/// Run `body` while holding `lock`.
pub fn with_exclusive_lock<L, F, R>(lock: &L, body: F) -> Result<R>
where
    L: QueueLock,
    F: FnOnce() -> Result<R>,
{
    let _guard = lock.acquire()?;
    body()
}

/// flock-based [`QueueLock`] on `<queue dir>/lockfile`
#[derive(Debug, Clone)]
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    /// Lock scoped to the given queue directory
    pub fn new(queue_dir: &Path) -> Self {
        Self {
            path: queue_dir.join(LOCK_FILE),
        }
    }

    /// Path of the lockfile
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl QueueLock for FileLock {
    type Guard = FileLockGuard;

    fn acquire(&self) -> Result<FileLockGuard> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(|e| {
                Error::Lock(format!(
                    "failed to open lock file {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        tracing::debug!(path = %self.path.display(), "Waiting for queue lock");

        lock_file_blocking(&file).map_err(|e| {
            Error::Lock(format!("failed to lock file {}: {}", self.path.display(), e))
        })?;

        tracing::debug!(path = %self.path.display(), "Acquired queue lock");
        Ok(FileLockGuard { file })
    }
}

/// Releases the flock when dropped
pub struct FileLockGuard {
    file: File,
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        // Closing the descriptor would release it too; unlock explicitly first.
        if let Err(e) = unlock_file(&self.file) {
            tracing::warn!(error = %e, "Failed to release queue lock");
        }
    }
}

#[cfg(unix)]
fn lock_file_blocking(file: &File) -> io::Result<()> {
    const LOCK_EX: i32 = 2;
    let fd = file.as_raw_fd();
    loop {
        // SAFETY: flock is called with a valid file descriptor and constant flags.
        let rc = unsafe { flock(fd, LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(unix)]
fn unlock_file(file: &File) -> io::Result<()> {
    const LOCK_UN: i32 = 8;
    let fd = file.as_raw_fd();
    // SAFETY: flock is called with a valid file descriptor and constant flags.
    let rc = unsafe { flock(fd, LOCK_UN) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
unsafe extern "C" {
    fn flock(fd: i32, operation: i32) -> i32;
}

#[cfg(not(unix))]
compile_error!("ilert-zabbix queue locks currently require Unix (macOS/Linux)");
