//! cli
//!
//! Command-line interface layer for subvend.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Delegate to command handlers
//! - Does NOT perform repository mutations directly
//!
//! # Architecture
//!
//! The CLI layer is thin. It parses arguments via clap and dispatches to the
//! [`crate::sync`] engine for execution. All repository state changes flow
//! through the engine's validated operations.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use anyhow::Result;

use crate::core::types::UrlPolicy;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();

    let cwd = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    let url_policy = if cli.allow_file_urls {
        UrlPolicy::AllowFile
    } else {
        UrlPolicy::Strict
    };

    commands::dispatch(cli.command, &cwd, url_policy)
}
