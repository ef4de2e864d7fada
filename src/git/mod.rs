//! git
//!
//! Repository access, split by mechanism:
//!
//! - [`interface`] - object-store operations via git2
//! - [`process`] - bounded-timeout executor for the git binary
//!
//! The interface covers everything the engine composes itself (fetch, tree
//! grafting, commits, reset, history queries). The process executor exists
//! for the one operation that stays on the binary: history splitting for
//! push.

pub mod interface;
pub mod process;

pub use interface::{CommitInfo, Git, GitError, RepoInfo};
pub use process::{ExecError, ExecOutput, ExecStatus, GitCli};
