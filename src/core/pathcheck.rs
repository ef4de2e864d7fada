//! core::pathcheck
//!
//! Memoized filesystem path validation.
//!
//! # Architecture
//!
//! Callers hand the engine raw path strings (working directories, status
//! targets). Those are checked lexically - traversal sequences are rejected
//! and absolute paths must stay inside the cache's root - before any
//! repository code touches them. The same handful of paths is re-checked
//! many times within one process lifetime, so results are memoized.
//!
//! The cache is an explicit owned object, constructed once and shared by
//! reference, rather than a process-global. Path validity for a fixed input
//! is deterministic, so entries never expire and idempotent rewrites of the
//! same boolean are harmless; a lock-free concurrent map makes concurrent
//! readers and writers safe with no further coordination.
//!
//! # Example
//!
//! ```
//! use subvend::core::pathcheck::PathCache;
//! use std::path::PathBuf;
//!
//! let cache = PathCache::new(PathBuf::from("/work"));
//! assert!(cache.is_valid("vendor/lib"));
//! assert!(cache.is_valid("/work/vendor"));
//! assert!(!cache.is_valid("../outside"));
//! assert!(!cache.is_valid("/etc/passwd"));
//! ```

use std::path::{Component, Path, PathBuf};

use dashmap::DashMap;

/// Shared, concurrency-safe memoization of path-validity checks.
#[derive(Debug)]
pub struct PathCache {
    /// Directory absolute paths must resolve inside.
    root: PathBuf,
    /// Raw input string -> validity. Write-once per key, never evicted.
    entries: DashMap<String, bool>,
}

impl PathCache {
    /// Create a cache whose containment root is `root`.
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            entries: DashMap::new(),
        }
    }

    /// Create a cache rooted at the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the current directory cannot be determined.
    pub fn for_cwd() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// Get the containment root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check whether a raw path string is safe to use.
    ///
    /// Rejects empty paths, paths whose lexical normalization still escapes
    /// upward, and absolute paths outside the root. Results are cached
    /// keyed by the raw input string.
    pub fn is_valid(&self, raw: &str) -> bool {
        if raw.is_empty() {
            return false;
        }

        if let Some(cached) = self.entries.get(raw) {
            return *cached;
        }

        let valid = self.check(Path::new(raw));
        self.entries.insert(raw.to_string(), valid);
        valid
    }

    /// Number of memoized entries. Primarily for tests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache has no entries yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn check(&self, path: &Path) -> bool {
        let Some(clean) = normalize(path) else {
            return false;
        };

        if clean.is_absolute() && !clean.starts_with(&self.root) {
            return false;
        }

        true
    }
}

/// Lexically normalize a path, resolving `.` and `..` components.
///
/// Returns `None` when a `..` component would climb above the path's start,
/// which is exactly the traversal case the validators must reject. No
/// filesystem access: inputs may name paths that do not exist yet.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            other => out.push(other),
        }
    }

    if out.as_os_str().is_empty() {
        out.push(".");
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache() -> PathCache {
        PathCache::new(PathBuf::from("/work/repo"))
    }

    #[test]
    fn accepts_relative_paths() {
        let cache = cache();
        assert!(cache.is_valid("."));
        assert!(cache.is_valid("vendor/lib"));
        assert!(cache.is_valid("a/./b"));
    }

    #[test]
    fn accepts_absolute_paths_inside_root() {
        let cache = cache();
        assert!(cache.is_valid("/work/repo"));
        assert!(cache.is_valid("/work/repo/vendor"));
    }

    #[test]
    fn rejects_absolute_paths_outside_root() {
        let cache = cache();
        assert!(!cache.is_valid("/etc/passwd"));
        assert!(!cache.is_valid("/work/other"));
    }

    #[test]
    fn rejects_traversal() {
        let cache = cache();
        assert!(!cache.is_valid(".."));
        assert!(!cache.is_valid("../sibling"));
        assert!(!cache.is_valid("a/../../outside"));
    }

    #[test]
    fn resolvable_parent_components_are_fine() {
        let cache = cache();
        assert!(cache.is_valid("a/b/../c"));
        // Climbs out of root via an absolute path
        assert!(!cache.is_valid("/work/repo/../other"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!cache().is_valid(""));
    }

    #[test]
    fn memoizes_results() {
        let cache = cache();
        assert!(cache.is_empty());

        assert!(cache.is_valid("vendor/lib"));
        assert!(!cache.is_valid("../out"));
        assert_eq!(cache.len(), 2);

        // Re-checks hit the cache; entry count is unchanged
        assert!(cache.is_valid("vendor/lib"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn normalize_resolves_dots() {
        assert_eq!(normalize(Path::new("a/./b/../c")), Some(PathBuf::from("a/c")));
        assert_eq!(normalize(Path::new("./x")), Some(PathBuf::from("x")));
        assert_eq!(normalize(Path::new("a/..")), Some(PathBuf::from(".")));
        assert_eq!(normalize(Path::new("a/../..")), None);
    }
}
