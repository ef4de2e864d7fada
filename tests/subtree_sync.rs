//! Integration tests for the subtree engine.
//!
//! These tests build real git repositories via tempfile and vendor one into
//! another over file:// URLs, verifying the full add/pull/reset sequences
//! against actual object-store state.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use subvend::core::types::UrlPolicy;
use subvend::sync::{Subtree, SyncError};

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on `main`.
    fn new() -> Self {
        let repo = Self::empty();

        std::fs::write(repo.path().join("README.md"), "# Test Repo\n").unwrap();
        repo.run_git(&["add", "README.md"]);
        repo.run_git(&["commit", "-m", "Initial commit"]);

        repo
    }

    /// Create a repository with no commits at all.
    fn empty() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);

        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a subtree engine for this repository, accepting file:// URLs.
    fn engine(&self) -> Subtree {
        Subtree::open(self.path(), UrlPolicy::AllowFile).expect("failed to open engine")
    }

    /// A file:// URL for fetching from this repository.
    fn url(&self) -> String {
        format!("file://{}", self.path().display())
    }

    /// Create a file (and parent directories) and commit it.
    fn commit_file(&self, path: &str, content: &str, message: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
        self.run_git(&["add", path]);
        self.run_git(&["commit", "-m", message]);
    }

    /// Read a file from the working tree.
    fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path)).expect("file missing from working tree")
    }

    /// Get HEAD OID using git directly.
    fn head_oid(&self) -> String {
        self.git_stdout(&["rev-parse", "HEAD"])
    }

    /// Full message of the HEAD commit.
    fn head_message(&self) -> String {
        self.git_stdout(&["log", "-1", "--format=%B"])
    }

    /// Number of parents of the HEAD commit.
    fn head_parent_count(&self) -> usize {
        self.git_stdout(&["rev-list", "--parents", "-1", "HEAD"])
            .split_whitespace()
            .count()
            - 1
    }

    fn run_git(&self, args: &[&str]) {
        run_git(self.path(), args);
    }

    fn git_stdout(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git command failed");
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// An upstream repository with library content worth vendoring.
fn upstream() -> TestRepo {
    let repo = TestRepo::new();
    repo.commit_file("lib.txt", "upstream v1\n", "Add lib.txt");
    repo.commit_file("src/deep.txt", "deep v1\n", "Add nested file");
    repo
}

// =============================================================================
// add
// =============================================================================

#[test]
fn add_vendors_upstream_content() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();

    engine.add("vendor/lib", &up.url(), "main").expect("add");

    assert_eq!(host.read("vendor/lib/lib.txt"), "upstream v1\n");
    assert_eq!(host.read("vendor/lib/src/deep.txt"), "deep v1\n");
    // Host's own files survive the graft
    assert_eq!(host.read("README.md"), "# Test Repo\n");

    assert!(engine.has_subtree("vendor/lib").unwrap());
    assert_eq!(host.head_parent_count(), 2);
}

#[test]
fn add_writes_porcelain_compatible_marker() {
    let up = upstream();
    let host = TestRepo::new();
    host.engine().add("vendor/lib", &up.url(), "main").unwrap();

    let message = host.head_message();
    assert!(message.starts_with("Squashed 'vendor/lib' content from commit "));
    assert!(message.contains("git-subtree-dir: vendor/lib"));
    assert!(message.contains(&format!("git-subtree-split: {}", up.head_oid())));
}

#[test]
fn add_twice_is_a_precondition_error() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();

    engine.add("vendor/lib", &up.url(), "main").unwrap();
    let head_before = host.head_oid();

    let err = engine.add("vendor/lib", &up.url(), "main").unwrap_err();
    assert!(matches!(err, SyncError::AlreadyVendored { .. }));

    // The rejected call changed nothing
    assert_eq!(host.head_oid(), head_before);
    assert_eq!(host.read("vendor/lib/lib.txt"), "upstream v1\n");
}

#[test]
fn add_refuses_occupied_prefix() {
    let up = upstream();
    let host = TestRepo::new();
    host.commit_file("vendor/lib/native.txt", "mine\n", "Add native content");

    let err = host
        .engine()
        .add("vendor/lib", &up.url(), "main")
        .unwrap_err();
    assert!(matches!(err, SyncError::PrefixOccupied { .. }));
}

#[test]
fn add_rejects_invalid_inputs_before_touching_anything() {
    let host = TestRepo::new();
    let engine = host.engine();
    let head_before = host.head_oid();

    for (prefix, url, branch) in [
        ("../escape", "https://example.com/x.git", "main"),
        ("vendor/lib", "https://example.com/x.git", "-bad"),
        ("vendor/lib", "ftp://example.com/x.git", "main"),
        ("vendor;rm -rf /", "https://example.com/x.git", "main"),
    ] {
        let err = engine.add(prefix, url, branch).unwrap_err();
        assert!(matches!(err, SyncError::Validate(_)), "accepted {prefix:?}");
    }

    assert_eq!(host.head_oid(), head_before);
}

// =============================================================================
// has_subtree / inspection
// =============================================================================

#[test]
fn has_subtree_is_false_without_marker() {
    let host = TestRepo::new();
    assert!(!host.engine().has_subtree("vendor/lib").unwrap());
}

#[test]
fn empty_repository_reports_no_subtree_rather_than_erroring() {
    let host = TestRepo::empty();
    assert!(!host.engine().has_subtree("vendor/lib").unwrap());
}

#[test]
fn control_bytes_in_inputs_are_rejected_not_stripped() {
    let host = TestRepo::new();
    let engine = host.engine();

    // Stripping the control byte would leave an acceptable name; the raw
    // input has to fail instead.
    let err = engine.has_subtree("vendor\u{0}lib").unwrap_err();
    assert!(matches!(err, SyncError::Validate(_)));

    let err = engine
        .add("vendor/lib", "https://example.com/x.git", "ma\u{1b}in")
        .unwrap_err();
    assert!(matches!(err, SyncError::Validate(_)));
}

#[test]
fn current_branch_reports_main_and_detached_head() {
    let host = TestRepo::new();
    let engine = host.engine();
    assert_eq!(engine.current_branch().unwrap().as_str(), "main");

    host.run_git(&["checkout", "--detach"]);
    assert_eq!(engine.current_branch().unwrap().as_str(), "HEAD");
}

#[test]
fn uncommitted_changes_are_detected() {
    let host = TestRepo::new();
    let engine = host.engine();
    assert!(!engine.has_uncommitted_changes().unwrap());

    std::fs::write(host.path().join("scratch.txt"), "wip\n").unwrap();
    assert!(engine.has_uncommitted_changes().unwrap());
}

// =============================================================================
// pull
// =============================================================================

#[test]
fn pull_replaces_vendored_content_with_upstream_tip() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    up.commit_file("lib.txt", "upstream v2\n", "Update lib.txt");
    up.commit_file("extra.txt", "new file\n", "Add extra.txt");

    engine.pull("vendor/lib", &up.url(), "main").expect("pull");

    assert_eq!(host.read("vendor/lib/lib.txt"), "upstream v2\n");
    assert_eq!(host.read("vendor/lib/extra.txt"), "new file\n");
    assert_eq!(host.head_parent_count(), 2);

    let message = host.head_message();
    assert!(message.starts_with("Squashed 'vendor/lib' changes from "));
    assert!(message.contains(&format!("git-subtree-split: {}", up.head_oid())));
}

#[test]
fn pull_removes_files_deleted_upstream() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    up.run_git(&["rm", "lib.txt"]);
    up.run_git(&["commit", "-m", "Remove lib.txt"]);

    engine.pull("vendor/lib", &up.url(), "main").unwrap();
    assert!(!host.path().join("vendor/lib/lib.txt").exists());
    assert_eq!(host.read("vendor/lib/src/deep.txt"), "deep v1\n");
}

#[test]
fn pull_without_marker_is_a_precondition_error() {
    let up = upstream();
    let host = TestRepo::new();

    let err = host
        .engine()
        .pull("vendor/lib", &up.url(), "main")
        .unwrap_err();
    assert!(matches!(err, SyncError::NotVendored { .. }));
}

// =============================================================================
// push
// =============================================================================

#[test]
fn push_without_marker_is_a_precondition_error() {
    let up = upstream();
    let host = TestRepo::new();

    let err = host
        .engine()
        .push("vendor/lib", &up.url(), "main")
        .unwrap_err();
    assert!(matches!(err, SyncError::NotVendored { .. }));
}

// =============================================================================
// reset
// =============================================================================

#[test]
fn reset_round_trips_to_pristine_upstream_content() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    // Local drift inside the vendored prefix
    host.commit_file("vendor/lib/lib.txt", "local hack\n", "Patch vendored lib");
    assert_eq!(host.read("vendor/lib/lib.txt"), "local hack\n");

    engine.reset("vendor/lib", &up.url(), "main").expect("reset");

    assert!(engine.has_subtree("vendor/lib").unwrap());
    assert_eq!(host.read("vendor/lib/lib.txt"), "upstream v1\n");
    assert_eq!(host.read("vendor/lib/src/deep.txt"), "deep v1\n");

    // Ends on a fresh two-parent sync commit, preceded by the removal commit
    assert_eq!(host.head_parent_count(), 2);
    let removal = host.git_stdout(&["log", "-1", "--format=%s", "HEAD^1"]);
    assert_eq!(removal, "Remove 'vendor/lib' subtree for reset");
}

#[test]
fn reset_without_marker_is_a_precondition_error() {
    let up = upstream();
    let host = TestRepo::new();

    let err = host
        .engine()
        .reset("vendor/lib", &up.url(), "main")
        .unwrap_err();
    assert!(matches!(err, SyncError::NotVendored { .. }));
}

// =============================================================================
// check_behind
// =============================================================================

#[test]
fn check_behind_is_zero_against_unchanged_upstream() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    let behind = engine.check_behind("vendor/lib", &up.url(), "main").unwrap();
    assert_eq!(behind, 0);
}

#[test]
fn check_behind_is_zero_after_pull() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    up.commit_file("lib.txt", "upstream v2\n", "Update lib.txt");
    engine.pull("vendor/lib", &up.url(), "main").unwrap();

    let behind = engine.check_behind("vendor/lib", &up.url(), "main").unwrap();
    assert_eq!(behind, 0);
}

#[test]
fn check_behind_counts_only_commits_touching_the_prefix_path() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    // Upstream commits address their own root-relative paths, which never
    // fall under the host-side prefix, so the scoped count stays at zero
    // even when the upstream has moved ahead.
    up.commit_file("lib.txt", "upstream v2\n", "Update lib.txt");
    up.commit_file("other.txt", "noise\n", "Add other.txt");

    let behind = engine.check_behind("vendor/lib", &up.url(), "main").unwrap();
    assert_eq!(behind, 0);
}

#[test]
fn check_behind_without_marker_is_a_precondition_error() {
    let up = upstream();
    let host = TestRepo::new();

    let err = host
        .engine()
        .check_behind("vendor/lib", &up.url(), "main")
        .unwrap_err();
    assert!(matches!(err, SyncError::NotVendored { .. }));
}

// =============================================================================
// commit_changes
// =============================================================================

#[test]
fn commit_changes_stages_and_commits_everything() {
    let host = TestRepo::new();
    let engine = host.engine();

    std::fs::write(host.path().join("new.txt"), "hello\n").unwrap();
    std::fs::write(host.path().join("README.md"), "# Edited\n").unwrap();

    engine.commit_changes("Snapshot working state").expect("commit");

    assert!(!engine.has_uncommitted_changes().unwrap());
    assert_eq!(host.head_message(), "Snapshot working state");
}

#[test]
fn commit_changes_on_clean_tree_is_a_distinct_error() {
    let host = TestRepo::new();
    let err = host.engine().commit_changes("nothing here").unwrap_err();
    assert!(matches!(err, SyncError::NoChanges));
}

#[test]
fn commit_changes_rejects_control_characters_in_message() {
    let host = TestRepo::new();
    std::fs::write(host.path().join("new.txt"), "hello\n").unwrap();

    let err = host
        .engine()
        .commit_changes("bad\x07message")
        .unwrap_err();
    assert!(matches!(err, SyncError::Validate(_)));
}

// =============================================================================
// bindings and status
// =============================================================================

#[test]
fn add_records_binding_used_by_later_resolution() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    let (url, branch) = engine.resolve_upstream("vendor/lib", None, None).unwrap();
    assert_eq!(url, up.url());
    assert_eq!(branch, "main");

    // Explicit arguments win over the binding
    let (url, _) = engine
        .resolve_upstream("vendor/lib", Some("https://other.example/x.git"), Some("dev"))
        .unwrap();
    assert_eq!(url, "https://other.example/x.git");
}

#[test]
fn resolution_without_binding_names_the_missing_arguments() {
    let host = TestRepo::new();
    let err = host
        .engine()
        .resolve_upstream("vendor/lib", None, None)
        .unwrap_err();
    assert!(matches!(err, SyncError::NoBinding { .. }));
}

#[test]
fn status_reports_binding_and_last_sync_point() {
    let up = upstream();
    let host = TestRepo::new();
    let engine = host.engine();
    engine.add("vendor/lib", &up.url(), "main").unwrap();

    let statuses = engine.status().unwrap();
    assert_eq!(statuses.len(), 1);
    assert_eq!(statuses[0].prefix, "vendor/lib");
    assert_eq!(statuses[0].binding.as_ref().unwrap().branch, "main");
    assert_eq!(statuses[0].last_split.as_deref(), Some(up.head_oid().as_str()));
    assert!(statuses[0].last_synced.is_some());
}
