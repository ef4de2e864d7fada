//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--allow-file-urls`: Accept `file://` upstream URLs (local mirrors)

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Subvend - vendor and synchronize upstream subtrees without the porcelain
#[derive(Parser, Debug)]
#[command(name = "subvend")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if subvend was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Accept file:// upstream URLs (local mirrors; off by default)
    #[arg(long, global = true)]
    pub allow_file_urls: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Vendor an upstream repository under a prefix
    #[command(
        name = "add",
        long_about = "Vendor an upstream repository under a prefix.\n\n\
            Fetches the upstream branch and grafts its tree into the current \
            branch at <prefix>/, recording provenance in the commit message so \
            later pulls and pushes can find the sync point. The upstream \
            url/branch pair is also stored so subsequent commands can omit it.",
        after_help = "\
EXAMPLES:
    # Vendor a library under vendor/lib
    subvend add vendor/lib https://example.com/lib.git main

    # Vendor from a local mirror
    subvend --allow-file-urls add vendor/lib file:///srv/mirrors/lib.git main"
    )]
    Add {
        /// Directory prefix to vendor under (relative, no leading slash)
        prefix: String,

        /// Upstream repository URL
        url: String,

        /// Upstream branch to track
        branch: String,
    },

    /// Update a vendored prefix to the upstream branch tip
    #[command(
        name = "pull",
        long_about = "Update a vendored prefix to the upstream branch tip.\n\n\
            Fetches the upstream branch and replaces the content under the \
            prefix with the fetched tree, as a new two-parent sync commit. \
            When url and branch are omitted, the binding recorded by `add` \
            is used."
    )]
    Pull {
        /// Vendored prefix to update
        prefix: String,

        /// Upstream repository URL (defaults to the recorded binding)
        #[arg(long)]
        url: Option<String>,

        /// Upstream branch (defaults to the recorded binding)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Push local changes under a prefix back to the upstream
    #[command(
        name = "push",
        long_about = "Push local changes under a prefix back to the upstream.\n\n\
            Splits a prefix-only history out of the current branch (rejoining \
            so the split point is reused next time) and pushes the split tip \
            to the upstream branch."
    )]
    Push {
        /// Vendored prefix to push
        prefix: String,

        /// Upstream repository URL (defaults to the recorded binding)
        #[arg(long)]
        url: Option<String>,

        /// Upstream branch (defaults to the recorded binding)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Discard local subtree state and re-vendor from the upstream
    #[command(
        name = "reset",
        long_about = "Discard local subtree state and re-vendor from the upstream.\n\n\
            Removes the prefix from the current branch in a removal commit, \
            then re-runs the add sequence against the upstream. This is the \
            recovery path when a vendored prefix has diverged beyond repair."
    )]
    Reset {
        /// Vendored prefix to reset
        prefix: String,

        /// Upstream repository URL (defaults to the recorded binding)
        #[arg(long)]
        url: Option<String>,

        /// Upstream branch (defaults to the recorded binding)
        #[arg(long)]
        branch: Option<String>,
    },

    /// Show vendored prefixes, their bindings, and sync state
    #[command(
        name = "status",
        long_about = "Show vendored prefixes, their bindings, and sync state.\n\n\
            Lists every prefix with a recorded upstream binding, the upstream \
            commit of its most recent sync, and whether the working tree is \
            clean. With --fetch, also contacts each upstream and reports how \
            many unpulled commits touch the prefix."
    )]
    Status {
        /// Fetch each upstream and report behind counts
        #[arg(long)]
        fetch: bool,
    },

    /// Stage all changes and commit with the given message
    #[command(name = "commit")]
    Commit {
        /// Commit message
        message: String,
    },
}
