//! git::interface
//!
//! Object-store access via git2.
//!
//! This module is the single doorway to the repository's object graph. No
//! other module imports `git2` directly; everything above it works with
//! validated input types and opaque object ids.
//!
//! # Design
//!
//! The synchronization steps the engine sequences (fetch, tree grafting,
//! two-parent commits, branch repoint) are expressed directly against the
//! object store instead of parsing porcelain output. The one exception,
//! history splitting for push, stays on the git binary via
//! [`crate::git::process`].
//!
//! # Benign conditions
//!
//! History queries against a repository that has no commits yet are not
//! failures: an unborn HEAD collapses to "nothing found" so callers can
//! report a clean negative instead of an error.

use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;

use crate::core::types::{BranchName, Prefix, RemoteUrl};
use crate::git::process::NETWORK_TIMEOUT;

/// Errors from object-store operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in the store.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Fetch from the upstream remote failed.
    #[error("fetch failed: {message}")]
    FetchFailed {
        /// Underlying failure description
        message: String,
    },

    /// The repository reported a branch name that fails validation.
    #[error("invalid branch name detected: {message}")]
    InvalidBranch {
        /// Description of the problem
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                if context.starts_with("refs/") || context.contains("HEAD") {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        GitError::Internal {
            message: err.message().to_string(),
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to the .git directory
    pub git_dir: PathBuf,
    /// Path to the working directory
    pub work_dir: PathBuf,
}

/// Information about a commit, for status display.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: git2::Oid,
    /// Full commit message
    pub message: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The object-store interface.
///
/// Read operations (marker search, status, branch queries) are safe to call
/// concurrently; the mutating sequences composed by the engine are not, and
/// the engine serializes them behind [`crate::core::lock::RepoLock`].
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self { repo })
    }

    /// Check whether `path` is inside a Git repository.
    ///
    /// Tolerates nonexistent paths: returns false, never an error.
    pub fn is_repository(path: &Path) -> bool {
        git2::Repository::discover(path).is_ok()
    }

    /// Get repository information (git_dir and work_dir paths).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        let git_dir = self.repo.path().to_path_buf();
        let work_dir = self.repo.workdir().ok_or(GitError::BareRepo)?.to_path_buf();

        Ok(RepoInfo { git_dir, work_dir })
    }

    // =========================================================================
    // Branch and Status Queries
    // =========================================================================

    /// Get the current branch name.
    ///
    /// A detached HEAD reports the secondary form `HEAD`, matching what
    /// `git rev-parse --abbrev-ref HEAD` prints; an unborn branch reports
    /// the branch HEAD symbolically points at. Whatever the repository
    /// reports is re-validated before being returned.
    ///
    /// # Errors
    ///
    /// - [`GitError::InvalidBranch`] if the reported name fails validation
    pub fn current_branch(&self) -> Result<BranchName, GitError> {
        let name = match self.repo.head() {
            Ok(head) => {
                if head.is_branch() {
                    head.shorthand().unwrap_or("HEAD").to_string()
                } else {
                    "HEAD".to_string()
                }
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
                let head_ref = self
                    .repo
                    .find_reference("HEAD")
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?;
                head_ref
                    .symbolic_target()
                    .and_then(|t| t.strip_prefix("refs/heads/"))
                    .ok_or_else(|| GitError::RefNotFound {
                        refname: "HEAD".to_string(),
                    })?
                    .to_string()
            }
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        };

        BranchName::new(name).map_err(|e| GitError::InvalidBranch {
            message: e.to_string(),
        })
    }

    /// Check whether the working tree has any uncommitted changes.
    ///
    /// Counts staged, unstaged, and untracked entries, matching what
    /// `git status --porcelain` would print.
    pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        Ok(!statuses.is_empty())
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn (new repository)
    pub fn head_oid(&self) -> Result<git2::Oid, GitError> {
        let head = self
            .repo
            .head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        Ok(head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?
            .id())
    }

    /// Get information about a commit.
    pub fn commit_info(&self, oid: git2::Oid) -> Result<CommitInfo, GitError> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;

        let author_time = chrono::DateTime::from_timestamp(commit.author().when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);

        Ok(CommitInfo {
            oid,
            message: commit.message().unwrap_or("").to_string(),
            author_time,
        })
    }

    // =========================================================================
    // History Search
    // =========================================================================

    /// Search history from HEAD for a commit whose message contains the
    /// given marker line (matched against whole trimmed lines).
    ///
    /// A repository with no commits yet reports `Ok(None)`: an unborn HEAD
    /// is a benign condition for history queries, not a failure.
    pub fn find_marker_commit(&self, marker_line: &str) -> Result<Option<git2::Oid>, GitError> {
        // Probe HEAD directly: revwalk reports an unborn HEAD as a generic
        // reference error, so the benign case must be detected before walking.
        match self.repo.head() {
            Ok(_) => {}
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, "HEAD")),
        }

        let mut walk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        walk.push_head()
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        for oid in walk {
            let oid = oid.map_err(|e| GitError::from_git2(e, "revwalk"))?;
            let commit = self
                .repo
                .find_commit(oid)
                .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;

            if let Some(message) = commit.message() {
                if message.lines().any(|line| line.trim() == marker_line) {
                    return Ok(Some(oid));
                }
            }
        }

        Ok(None)
    }

    /// Count commits reachable from `tip` but not from `hide` that touch
    /// the given prefix path.
    pub fn count_commits_touching(
        &self,
        tip: git2::Oid,
        hide: git2::Oid,
        prefix: &Prefix,
    ) -> Result<usize, GitError> {
        let mut walk = self
            .repo
            .revwalk()
            .map_err(|e| GitError::from_git2(e, "revwalk"))?;
        walk.push(tip)
            .map_err(|e| GitError::from_git2(e, &tip.to_string()))?;
        walk.hide(hide)
            .map_err(|e| GitError::from_git2(e, &hide.to_string()))?;

        let mut count = 0;
        for oid in walk {
            let oid = oid.map_err(|e| GitError::from_git2(e, "revwalk"))?;
            if self.commit_touches(oid, prefix)? {
                count += 1;
            }
        }

        Ok(count)
    }

    /// Check whether a commit changes anything under the prefix path,
    /// relative to its first parent (or the empty tree for root commits).
    fn commit_touches(&self, oid: git2::Oid, prefix: &Prefix) -> Result<bool, GitError> {
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;

        let tree = commit
            .tree()
            .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(
                parent
                    .tree()
                    .map_err(|e| GitError::from_git2(e, &oid.to_string()))?,
            ),
            Err(_) => None,
        };

        let mut opts = git2::DiffOptions::new();
        opts.pathspec(prefix.as_str());

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, &oid.to_string()))?;

        Ok(diff.deltas().len() > 0)
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Fetch a branch from an upstream URL and return the fetched tip.
    ///
    /// The remote is anonymous (no refs are created beyond FETCH_HEAD);
    /// the URL and branch have already passed validation. The transfer is
    /// held to the same time budget as subprocess network operations
    /// ([`NETWORK_TIMEOUT`]): the progress callback cancels the transfer
    /// once the deadline passes, so a stalled remote cannot pin the
    /// repository lock indefinitely.
    ///
    /// # Errors
    ///
    /// - [`GitError::FetchFailed`] with the transport's message, or a
    ///   timeout description when the budget was exceeded
    pub fn fetch(&self, url: &RemoteUrl, branch: &BranchName) -> Result<git2::Oid, GitError> {
        let mut remote =
            self.repo
                .remote_anonymous(url.as_str())
                .map_err(|e| GitError::FetchFailed {
                    message: e.message().to_string(),
                })?;

        let deadline = Instant::now() + NETWORK_TIMEOUT;
        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.transfer_progress(move |_| Instant::now() < deadline);

        let mut opts = git2::FetchOptions::new();
        opts.remote_callbacks(callbacks);
        remote
            .fetch(&[branch.as_str()], Some(&mut opts), None)
            .map_err(|e| {
                let message = if Instant::now() >= deadline {
                    format!(
                        "timed out after {}s: {}",
                        NETWORK_TIMEOUT.as_secs(),
                        e.message()
                    )
                } else {
                    e.message().to_string()
                };
                GitError::FetchFailed { message }
            })?;

        let fetch_head = self
            .repo
            .find_reference("FETCH_HEAD")
            .map_err(|e| GitError::from_git2(e, "FETCH_HEAD"))?;

        Ok(fetch_head
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, "FETCH_HEAD"))?
            .id())
    }

    // =========================================================================
    // Tree Surgery
    // =========================================================================

    /// Check whether a commit's tree contains an entry at the prefix path.
    pub fn tree_contains(&self, commit: git2::Oid, prefix: &Prefix) -> Result<bool, GitError> {
        let tree = self
            .repo
            .find_commit(commit)
            .map_err(|e| GitError::from_git2(e, &commit.to_string()))?
            .tree()
            .map_err(|e| GitError::from_git2(e, &commit.to_string()))?;

        match tree.get_path(Path::new(prefix.as_str())) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::from_git2(e, prefix.as_str())),
        }
    }

    /// Graft the tree of `subtree_commit` into `base_commit`'s tree at
    /// `prefix/`, returning the new tree OID.
    ///
    /// An existing entry at the prefix is replaced, which is how pull
    /// swaps previously grafted content for the newly fetched tree.
    pub fn graft_subtree(
        &self,
        base_commit: git2::Oid,
        prefix: &Prefix,
        subtree_commit: git2::Oid,
    ) -> Result<git2::Oid, GitError> {
        let base_tree = self
            .repo
            .find_commit(base_commit)
            .map_err(|e| GitError::from_git2(e, &base_commit.to_string()))?
            .tree()
            .map_err(|e| GitError::from_git2(e, &base_commit.to_string()))?;

        let subtree_id = self
            .repo
            .find_commit(subtree_commit)
            .map_err(|e| GitError::from_git2(e, &subtree_commit.to_string()))?
            .tree_id();

        let mut builder = git2::build::TreeUpdateBuilder::new();
        builder.upsert(prefix.as_str(), subtree_id, git2::FileMode::Tree);

        builder
            .create_updated(&self.repo, &base_tree)
            .map_err(|e| GitError::from_git2(e, prefix.as_str()))
    }

    /// Remove the entry at `prefix` from `base_commit`'s tree, returning
    /// the new tree OID.
    ///
    /// # Errors
    ///
    /// Fails if the prefix is not present in the tree.
    pub fn remove_subtree(
        &self,
        base_commit: git2::Oid,
        prefix: &Prefix,
    ) -> Result<git2::Oid, GitError> {
        let base_tree = self
            .repo
            .find_commit(base_commit)
            .map_err(|e| GitError::from_git2(e, &base_commit.to_string()))?
            .tree()
            .map_err(|e| GitError::from_git2(e, &base_commit.to_string()))?;

        let mut builder = git2::build::TreeUpdateBuilder::new();
        builder.remove(prefix.as_str());

        builder
            .create_updated(&self.repo, &base_tree)
            .map_err(|e| GitError::from_git2(e, prefix.as_str()))
    }

    // =========================================================================
    // Commit Creation and Branch Repoint
    // =========================================================================

    /// Create a commit object for `tree` with the given parents.
    ///
    /// No ref is updated: the new commit exists in the object store but the
    /// working branch does not move until [`Self::hard_reset`]. That gap is
    /// what keeps partial failures recoverable.
    pub fn commit_tree(
        &self,
        tree: git2::Oid,
        message: &str,
        parents: &[git2::Oid],
    ) -> Result<git2::Oid, GitError> {
        let tree = self
            .repo
            .find_tree(tree)
            .map_err(|e| GitError::from_git2(e, &tree.to_string()))?;

        let signature = self.repo.signature()?;

        let parent_commits: Vec<git2::Commit> = parents
            .iter()
            .map(|&id| {
                self.repo
                    .find_commit(id)
                    .map_err(|e| GitError::from_git2(e, &id.to_string()))
            })
            .collect::<Result<_, _>>()?;
        let parent_refs: Vec<&git2::Commit> = parent_commits.iter().collect();

        Ok(self
            .repo
            .commit(None, &signature, &signature, message, &tree, &parent_refs)?)
    }

    /// Atomically repoint the working branch at `commit` and check out its
    /// tree, equivalent to `git reset --hard <commit>`.
    pub fn hard_reset(&self, commit: git2::Oid) -> Result<(), GitError> {
        let object = self
            .repo
            .find_object(commit, Some(git2::ObjectType::Commit))
            .map_err(|e| GitError::from_git2(e, &commit.to_string()))?;

        let mut checkout = git2::build::CheckoutBuilder::new();
        checkout.force();

        self.repo
            .reset(&object, git2::ResetType::Hard, Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &commit.to_string()))
    }

    // =========================================================================
    // Staging and Plain Commits
    // =========================================================================

    /// Stage all changes (additions, modifications, deletions), matching
    /// `git add -A`.
    pub fn stage_all(&self) -> Result<(), GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        Ok(())
    }

    /// Commit the staged index on the current branch.
    ///
    /// Handles the unborn-HEAD case by creating a root commit.
    pub fn commit_staged(&self, message: &str) -> Result<git2::Oid, GitError> {
        let mut index = self.repo.index()?;
        let tree_id = index.write_tree()?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(|e| GitError::from_git2(e, &tree_id.to_string()))?;

        let signature = self.repo.signature()?;

        match self.repo.head() {
            Ok(head) => {
                let parent = head
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, "HEAD"))?;
                Ok(self.repo.commit(
                    Some("HEAD"),
                    &signature,
                    &signature,
                    message,
                    &tree,
                    &[&parent],
                )?)
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(self.repo.commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                &tree,
                &[],
            )?),
            Err(e) => Err(GitError::from_git2(e, "HEAD")),
        }
    }
}
