//! core::lock
//!
//! Exclusive repository lock for mutating subtree operations.
//!
//! # Architecture
//!
//! The subtree engine's mutations (add, pull, push, reset) sequence several
//! partially-irreversible object-graph steps, so only one may be in flight
//! per repository. The lock is an OS-level advisory file lock at
//! `<git_dir>/subvend/lock`, acquired non-blocking: a second writer fails
//! fast instead of queueing. Inspector reads never take it.
//!
//! # Invariants
//!
//! - Held for the full duration of a mutating operation
//! - Released automatically on drop (RAII)
//! - Acquisition is non-blocking (fails fast if locked)

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::SubvendPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process already holds the lock.
    #[error("repository is locked by another subvend process")]
    AlreadyLocked,

    /// Failed to create lock file or directory.
    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    /// Failed to acquire the OS lock.
    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    /// Failed to release the lock.
    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// An exclusive lock on the repository.
///
/// Released when dropped, so the lock cannot outlive a panicking operation.
///
/// # Example
///
/// ```ignore
/// let lock = RepoLock::acquire(&paths)?;
/// // ... mutate the repository ...
/// drop(lock);
/// ```
#[derive(Debug)]
pub struct RepoLock {
    /// Path to the lock file.
    path: PathBuf,
    /// Open handle holding the lock; Some while held.
    file: Option<File>,
}

impl RepoLock {
    /// Attempt to acquire the repository lock.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another process holds the lock
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock cannot be acquired
    pub fn acquire(paths: &SubvendPaths) -> Result<Self, LockError> {
        paths.ensure_dirs().map_err(|e| {
            LockError::CreateFailed(format!(
                "cannot create {}: {}",
                paths.subvend_dir().display(),
                e
            ))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(LockError::AlreadyLocked),
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Check if the lock is currently held by this guard.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Get the path to the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock explicitly.
    ///
    /// Called automatically on drop; explicit release is for callers that
    /// need the lock gone before the guard leaves scope.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for RepoLock {
    fn drop(&mut self) {
        // Best-effort release; errors unobservable during drop
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}
