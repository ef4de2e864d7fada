//! core::paths
//!
//! Centralized path routing for subvend storage locations.
//!
//! All subvend state lives under `<git_dir>/subvend/`:
//! - `config.toml` - vendored-subtree bindings (prefix -> upstream url/branch)
//! - `lock` - exclusive lock file for mutating operations
//!
//! No code outside this module computes `*.join("subvend")` paths.
//!
//! # Example
//!
//! ```
//! use subvend::core::paths::SubvendPaths;
//! use std::path::PathBuf;
//!
//! let paths = SubvendPaths::new(PathBuf::from("/repo/.git"));
//! assert_eq!(paths.config_path(), PathBuf::from("/repo/.git/subvend/config.toml"));
//! assert_eq!(paths.lock_path(), PathBuf::from("/repo/.git/subvend/lock"));
//! ```

use std::path::{Path, PathBuf};

/// Path routing for subvend storage under the repository's git directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubvendPaths {
    /// Path to the repository's .git directory.
    git_dir: PathBuf,
}

impl SubvendPaths {
    /// Create path routing for the given git directory.
    pub fn new(git_dir: PathBuf) -> Self {
        Self { git_dir }
    }

    /// Get the git directory.
    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    /// Get the root subvend directory: `<git_dir>/subvend`.
    pub fn subvend_dir(&self) -> PathBuf {
        self.git_dir.join("subvend")
    }

    /// Get the binding config path: `<git_dir>/subvend/config.toml`.
    pub fn config_path(&self) -> PathBuf {
        self.subvend_dir().join("config.toml")
    }

    /// Get the lock file path: `<git_dir>/subvend/lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.subvend_dir().join("lock")
    }

    /// Ensure the subvend directory exists.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.subvend_dir())
    }
}
