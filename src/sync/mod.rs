//! sync
//!
//! The subtree engine: vendoring a subdirectory from an upstream repository
//! and keeping it synchronized, without the `git subtree` porcelain.
//!
//! # Architecture
//!
//! Every operation is a fixed linear sequence of steps against the object
//! graph. Mutations build the replacement commit off to the side (fetch,
//! tree graft, commit object) and move the working branch only at the final
//! hard-reset step, so a failure anywhere earlier leaves the branch where it
//! was. There is no compensating rollback; [`Subtree::reset`] is the
//! recovery path.
//!
//! Mutating operations serialize behind the advisory [`RepoLock`]; the
//! inspection operations (`has_subtree`, `check_behind`, `status`,
//! `current_branch`, `has_uncommitted_changes`) never take it.
//!
//! # Validation
//!
//! Every operation validates its raw inputs on entry via the newtypes in
//! [`crate::core::types`]. The raw strings are validated as given, never
//! pre-sanitized: an input carrying a control byte is rejected, not quietly
//! stripped into something acceptable. Nothing downstream of that boundary
//! sees an unvalidated string.

pub mod marker;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::config::{ConfigError, RepoConfig, UpstreamBinding};
use crate::core::lock::{LockError, RepoLock};
use crate::core::pathcheck::PathCache;
use crate::core::paths::SubvendPaths;
use crate::core::types::{
    BranchName, CommitMessage, Prefix, RemoteUrl, UrlPolicy, ValidateError,
};
use crate::git::process::NETWORK_TIMEOUT;
use crate::git::{Git, GitCli, GitError};

/// Errors from subtree engine operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Input failed validation.
    #[error(transparent)]
    Validate(#[from] ValidateError),

    /// Object-store operation failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Subprocess execution failed.
    #[error(transparent)]
    Exec(#[from] crate::git::ExecError),

    /// Could not acquire or release the repository lock.
    #[error(transparent)]
    Lock(#[from] LockError),

    /// Configuration could not be read or written.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// `add` was asked to vendor a prefix that already has a sync marker.
    #[error("subtree already exists at prefix: {prefix}")]
    AlreadyVendored {
        /// The prefix that is already vendored
        prefix: String,
    },

    /// The prefix path is occupied by content that was never vendored.
    #[error("prefix already occupied by non-vendored content: {prefix}")]
    PrefixOccupied {
        /// The occupied prefix
        prefix: String,
    },

    /// A pull/push/reset was asked to operate on a prefix with no marker.
    #[error("no subtree found at prefix: {prefix}")]
    NotVendored {
        /// The prefix with no sync marker
        prefix: String,
    },

    /// No stored upstream binding and none supplied on the command line.
    #[error("no recorded upstream for prefix {prefix}; pass --url and --branch")]
    NoBinding {
        /// The prefix with no binding
        prefix: String,
    },

    /// `commit_changes` found nothing to commit.
    #[error("no changes to commit")]
    NoChanges,
}

/// Check whether `path` is inside a Git repository.
///
/// The path is screened through the validation cache first; an invalid or
/// traversal-shaped path is simply "not a repository", and nonexistent
/// paths are tolerated the same way.
pub fn is_repository(path: &str, cache: &PathCache) -> bool {
    cache.is_valid(path) && Git::is_repository(Path::new(path))
}

/// Check for uncommitted changes in the repository containing `path`.
///
/// # Errors
///
/// Returns an error for paths that fail validation or do not belong to a
/// repository.
pub fn has_uncommitted_changes(path: &str, cache: &PathCache) -> Result<bool, SyncError> {
    if !cache.is_valid(path) {
        return Err(GitError::NotARepo {
            path: PathBuf::from(path),
        }
        .into());
    }
    let git = Git::open(Path::new(path))?;
    Ok(git.has_uncommitted_changes()?)
}

/// Status of one vendored prefix, for display.
#[derive(Debug, Clone)]
pub struct SubtreeStatus {
    /// The vendored prefix.
    pub prefix: String,
    /// Recorded upstream binding, if any.
    pub binding: Option<UpstreamBinding>,
    /// The upstream commit of the most recent sync, if a marker was found.
    pub last_split: Option<String>,
    /// Author timestamp of the most recent marker commit.
    pub last_synced: Option<chrono::DateTime<chrono::Utc>>,
}

/// The subtree engine, bound to one host repository.
pub struct Subtree {
    /// Object-store access.
    git: Git,
    /// Subprocess executor, for the push path.
    cli: GitCli,
    /// Storage routing under `<git_dir>/subvend/`.
    paths: SubvendPaths,
    /// URL scheme policy for upstream validation.
    url_policy: UrlPolicy,
}

impl Subtree {
    /// Open the engine for the repository containing `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::NotARepo`] (wrapped) if no repository is found.
    pub fn open(path: &Path, url_policy: UrlPolicy) -> Result<Self, SyncError> {
        let git = Git::open(path)?;
        let info = git.info()?;
        let cli = GitCli::new(&info.work_dir);
        let paths = SubvendPaths::new(info.git_dir);

        Ok(Self {
            git,
            cli,
            paths,
            url_policy,
        })
    }

    /// Validate a full (prefix, url, branch) triple as given.
    fn validate_triple(
        &self,
        prefix: &str,
        url: &str,
        branch: &str,
    ) -> Result<(Prefix, RemoteUrl, BranchName), SyncError> {
        let prefix = Prefix::new(prefix)?;
        let url = RemoteUrl::new(url, self.url_policy)?;
        let branch = BranchName::new(branch)?;
        Ok((prefix, url, branch))
    }

    /// Resolve url/branch for a prefix, falling back to the stored binding.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoBinding`] when an argument is omitted and no binding
    ///   is recorded for the prefix
    pub fn resolve_upstream(
        &self,
        prefix: &str,
        url: Option<&str>,
        branch: Option<&str>,
    ) -> Result<(String, String), SyncError> {
        if let (Some(url), Some(branch)) = (url, branch) {
            return Ok((url.to_string(), branch.to_string()));
        }

        let validated = Prefix::new(prefix)?;
        let config = RepoConfig::load(&self.paths)?;
        let binding = config
            .binding(&validated)
            .ok_or_else(|| SyncError::NoBinding {
                prefix: validated.as_str().to_string(),
            })?;

        Ok((
            url.unwrap_or(&binding.url).to_string(),
            branch.unwrap_or(&binding.branch).to_string(),
        ))
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Check whether history contains a sync marker for `prefix`.
    ///
    /// A repository with no commits yet reports `false`, not an error.
    pub fn has_subtree(&self, prefix: &str) -> Result<bool, SyncError> {
        let prefix = Prefix::new(prefix)?;
        Ok(self
            .git
            .find_marker_commit(&marker::dir_line(&prefix))?
            .is_some())
    }

    /// Current branch name; detached HEAD reports the secondary form.
    pub fn current_branch(&self) -> Result<BranchName, SyncError> {
        Ok(self.git.current_branch()?)
    }

    /// Whether the working tree has uncommitted changes.
    pub fn has_uncommitted_changes(&self) -> Result<bool, SyncError> {
        Ok(self.git.has_uncommitted_changes()?)
    }

    /// How many upstream commits touching `prefix` have not been pulled.
    ///
    /// Fetches the upstream branch, then counts commits reachable from the
    /// fetched tip but not from HEAD, scoped to the prefix path. Once the
    /// fetch has succeeded the count is advisory: a failure while counting
    /// collapses to 0 rather than failing the operation.
    ///
    /// The scoping is applied in the host repository's path space. Upstream
    /// commits address their own root-relative paths, not `prefix/...`, so
    /// ordinary upstream-only commits do not count; a commit counts only
    /// when it changes something under the prefix path itself. This matches
    /// `git rev-list --count HEAD..FETCH_HEAD -- <prefix>`.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotVendored`] if the prefix has no sync marker
    /// - a fetch failure is an error; counting failures are not
    pub fn check_behind(&self, prefix: &str, url: &str, branch: &str) -> Result<usize, SyncError> {
        let (prefix, url, branch) = self.validate_triple(prefix, url, branch)?;
        self.require_marker(&prefix)?;

        let fetched = self.git.fetch(&url, &branch)?;
        let head = match self.git.head_oid() {
            Ok(oid) => oid,
            Err(_) => return Ok(0),
        };

        Ok(self
            .git
            .count_commits_touching(fetched, head, &prefix)
            .unwrap_or(0))
    }

    /// Status of every prefix with a recorded binding, plus marker state.
    pub fn status(&self) -> Result<Vec<SubtreeStatus>, SyncError> {
        let config = RepoConfig::load(&self.paths)?;
        let mut statuses = Vec::new();

        for (prefix, binding) in &config.subtrees {
            let validated = Prefix::new(prefix.clone())?;
            let (last_split, last_synced) =
                match self.git.find_marker_commit(&marker::dir_line(&validated))? {
                    Some(oid) => {
                        let info = self.git.commit_info(oid)?;
                        let split = marker::SubtreeMarker::parse(&info.message).map(|m| m.split);
                        (split, Some(info.author_time))
                    }
                    None => (None, None),
                };

            statuses.push(SubtreeStatus {
                prefix: prefix.clone(),
                binding: Some(binding.clone()),
                last_split,
                last_synced,
            });
        }

        Ok(statuses)
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Vendor `prefix` from an upstream for the first time.
    ///
    /// Sequence: precondition no marker and prefix unoccupied → fetch →
    /// graft the fetched tree at `prefix/` → two-parent marker commit →
    /// hard reset → record the upstream binding.
    ///
    /// # Errors
    ///
    /// - [`SyncError::AlreadyVendored`] if a marker already exists
    /// - [`SyncError::PrefixOccupied`] if HEAD's tree already has the path
    pub fn add(&self, prefix: &str, url: &str, branch: &str) -> Result<git2::Oid, SyncError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        let (prefix, url, branch) = self.validate_triple(prefix, url, branch)?;

        if self
            .git
            .find_marker_commit(&marker::dir_line(&prefix))?
            .is_some()
        {
            return Err(SyncError::AlreadyVendored {
                prefix: prefix.as_str().to_string(),
            });
        }

        let head = self.git.head_oid()?;
        if self.git.tree_contains(head, &prefix)? {
            return Err(SyncError::PrefixOccupied {
                prefix: prefix.as_str().to_string(),
            });
        }

        self.vendor(&prefix, &url, &branch)
    }

    /// The vendoring sequence shared by `add` and `reset`: fetch → graft at
    /// `prefix/` → two-parent marker commit → hard reset → record binding.
    ///
    /// Carries no precondition checks of its own. `reset` reuses it after
    /// its removal commit, where markers from the destroyed relationship
    /// are still reachable in history and must not block re-creation.
    fn vendor(
        &self,
        prefix: &Prefix,
        url: &RemoteUrl,
        branch: &BranchName,
    ) -> Result<git2::Oid, SyncError> {
        let head = self.git.head_oid()?;
        let fetched = self.git.fetch(url, branch)?;
        let tree = self.git.graft_subtree(head, prefix, fetched)?;
        let message = marker::add_message(prefix, fetched);
        let commit = self.git.commit_tree(tree, &message, &[head, fetched])?;
        self.git.hard_reset(commit)?;

        self.record_binding(prefix, url, branch)?;
        Ok(commit)
    }

    /// Update a vendored prefix to the upstream branch tip.
    ///
    /// Sequence: precondition marker exists → fetch → replace the prefix
    /// entry in HEAD's tree with the fetched tree → two-parent marker
    /// commit → hard reset. The replacement tolerates the prefix being
    /// absent from the current tree (a previously reset or hand-removed
    /// checkout); any other divergence surfaces as an error downstream.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotVendored`] if no marker exists for the prefix
    pub fn pull(&self, prefix: &str, url: &str, branch: &str) -> Result<git2::Oid, SyncError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        let (prefix, url, branch) = self.validate_triple(prefix, url, branch)?;
        self.require_marker(&prefix)?;

        let fetched = self.git.fetch(&url, &branch)?;
        let head = self.git.head_oid()?;
        let tree = self.git.graft_subtree(head, &prefix, fetched)?;
        let message = marker::pull_message(&prefix, fetched);
        let commit = self.git.commit_tree(tree, &message, &[head, fetched])?;
        self.git.hard_reset(commit)?;

        self.record_binding(&prefix, &url, &branch)?;
        Ok(commit)
    }

    /// Push local changes under `prefix` back to the upstream branch.
    ///
    /// History splitting stays on the git binary: `git subtree split
    /// --rejoin` reconstructs a prefix-only history (recognizing our marker
    /// commits as prior sync points), and the resulting tip is pushed to
    /// `refs/heads/<branch>` on the upstream. Returns the split tip.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotVendored`] if no marker exists for the prefix
    /// - [`SyncError::Exec`] carrying git's output if split or push fails
    pub fn push(&self, prefix: &str, url: &str, branch: &str) -> Result<String, SyncError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        let (prefix, url, branch) = self.validate_triple(prefix, url, branch)?;
        self.require_marker(&prefix)?;

        let split = self.cli.run_checked(
            &[
                "subtree",
                "split",
                &format!("--prefix={}", prefix.as_str()),
                "--rejoin",
            ],
            NETWORK_TIMEOUT,
        )?;

        let refspec = format!("{}:refs/heads/{}", split, branch.as_str());
        self.cli
            .run_checked(&["push", url.as_str(), &refspec], NETWORK_TIMEOUT)?;

        Ok(split)
    }

    /// Discard local subtree state and re-vendor from the upstream.
    ///
    /// Sequence: precondition marker exists → single-parent removal commit
    /// deleting the prefix from the tree (no marker in its message) → hard
    /// reset → re-run the `add` sequence. Runs under one lock acquisition
    /// for the whole recovery.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NotVendored`] if no marker exists for the prefix
    pub fn reset(&self, prefix: &str, url: &str, branch: &str) -> Result<git2::Oid, SyncError> {
        let _lock = RepoLock::acquire(&self.paths)?;
        let (prefix, url, branch) = self.validate_triple(prefix, url, branch)?;
        self.require_marker(&prefix)?;

        let head = self.git.head_oid()?;
        if self.git.tree_contains(head, &prefix)? {
            let tree = self.git.remove_subtree(head, &prefix)?;
            let message = format!("Remove '{}' subtree for reset", prefix.as_str());
            let commit = self.git.commit_tree(tree, &message, &[head])?;
            self.git.hard_reset(commit)?;
        }

        self.vendor(&prefix, &url, &branch)
    }

    /// Stage everything and commit with a sanitized message.
    ///
    /// # Errors
    ///
    /// - [`SyncError::NoChanges`] if the working tree is clean
    pub fn commit_changes(&self, message: &str) -> Result<git2::Oid, SyncError> {
        let message = CommitMessage::new(message)?;

        if !self.git.has_uncommitted_changes()? {
            return Err(SyncError::NoChanges);
        }

        self.git.stage_all()?;
        Ok(self.git.commit_staged(message.as_str())?)
    }

    // =========================================================================
    // Internal
    // =========================================================================

    /// Fail with `NotVendored` unless a sync marker exists for the prefix.
    fn require_marker(&self, prefix: &Prefix) -> Result<(), SyncError> {
        if self
            .git
            .find_marker_commit(&marker::dir_line(prefix))?
            .is_none()
        {
            return Err(SyncError::NotVendored {
                prefix: prefix.as_str().to_string(),
            });
        }
        Ok(())
    }

    /// Record (or refresh) the upstream binding for a prefix.
    fn record_binding(
        &self,
        prefix: &Prefix,
        url: &RemoteUrl,
        branch: &BranchName,
    ) -> Result<(), SyncError> {
        let mut config = RepoConfig::load(&self.paths)?;
        config.bind(prefix, url.as_str(), branch);
        config.save(&self.paths)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_prefix() {
        let err = SyncError::AlreadyVendored {
            prefix: "vendor/lib".to_string(),
        };
        assert!(err.to_string().contains("vendor/lib"));

        let err = SyncError::NotVendored {
            prefix: "vendor/lib".to_string(),
        };
        assert!(err.to_string().contains("no subtree found"));

        let err = SyncError::NoBinding {
            prefix: "vendor/lib".to_string(),
        };
        assert!(err.to_string().contains("--url"));
    }

    #[test]
    fn validation_errors_pass_through_transparently() {
        let err: SyncError = ValidateError::InvalidPrefix("path traversal".to_string()).into();
        assert!(err.to_string().contains("path traversal"));
    }

    #[test]
    fn is_repository_rejects_traversal_paths() {
        let cache = PathCache::for_cwd().unwrap();
        assert!(!is_repository("../../etc", &cache));
        assert!(!is_repository("a\0b", &cache));
    }
}
