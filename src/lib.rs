//! Subvend - vendor and synchronize upstream subtrees without the porcelain
//!
//! Subvend keeps a subdirectory of a host repository synchronized with an
//! independent upstream repository, implemented directly against the object
//! graph instead of the `git subtree` porcelain: add, pull, push, reset,
//! behind-count, and plain commits, all behind a strict input-validation
//! layer.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to sync)
//! - [`sync`] - The subtree engine: fixed linear operation sequences
//! - [`core`] - Validated input types, path cache, lock, config
//! - [`git`] - Repository access (git2 object store + bounded subprocess)
//!
//! # Correctness Invariants
//!
//! Subvend maintains the following invariants:
//!
//! 1. Operations run only against inputs that passed validation on entry
//! 2. Mutations build their result off to the side and move the working
//!    branch only at the final hard-reset step
//! 3. At most one mutation runs per repository (advisory lock)
//! 4. Provenance lives in commit messages, byte-compatible with
//!    `git subtree`, so no state outside the object graph is load-bearing

pub mod cli;
pub mod core;
pub mod git;
pub mod sync;
