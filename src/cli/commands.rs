//! cli::commands
//!
//! Command handlers. Each handler validates nothing itself: it resolves
//! omitted arguments from the recorded binding, delegates to the engine
//! (which validates everything on entry), and prints the outcome.

use std::path::Path;

use anyhow::{bail, Result};

use crate::cli::args::Command;
use crate::core::pathcheck::PathCache;
use crate::core::types::UrlPolicy;
use crate::sync::{self, marker, Subtree};

/// Dispatch a parsed command.
pub fn dispatch(command: Command, cwd: &Path, url_policy: UrlPolicy) -> Result<()> {
    let cache = PathCache::new(cwd.to_path_buf());
    let cwd_str = cwd.display().to_string();
    if !sync::is_repository(&cwd_str, &cache) {
        bail!("not a git repository: {cwd_str}");
    }

    let engine = Subtree::open(cwd, url_policy)?;

    match command {
        Command::Add {
            prefix,
            url,
            branch,
        } => {
            let commit = engine.add(&prefix, &url, &branch)?;
            println!(
                "Vendored '{}' from {} at {}",
                prefix,
                url,
                marker::short(&commit)
            );
        }

        Command::Pull {
            prefix,
            url,
            branch,
        } => {
            let (url, branch) =
                engine.resolve_upstream(&prefix, url.as_deref(), branch.as_deref())?;
            let commit = engine.pull(&prefix, &url, &branch)?;
            println!(
                "Updated '{}' from {} at {}",
                prefix,
                branch,
                marker::short(&commit)
            );
        }

        Command::Push {
            prefix,
            url,
            branch,
        } => {
            let (url, branch) =
                engine.resolve_upstream(&prefix, url.as_deref(), branch.as_deref())?;
            let split = engine.push(&prefix, &url, &branch)?;
            println!("Pushed '{}' to {} (split {})", prefix, branch, split);
        }

        Command::Reset {
            prefix,
            url,
            branch,
        } => {
            let (url, branch) =
                engine.resolve_upstream(&prefix, url.as_deref(), branch.as_deref())?;
            let commit = engine.reset(&prefix, &url, &branch)?;
            println!("Reset '{}' to upstream at {}", prefix, marker::short(&commit));
        }

        Command::Status { fetch } => {
            print_status(&engine, fetch)?;
        }

        Command::Commit { message } => {
            let commit = engine.commit_changes(&message)?;
            println!("Committed {}", marker::short(&commit));
        }
    }

    Ok(())
}

/// Print overall repository state plus per-prefix sync state.
fn print_status(engine: &Subtree, fetch: bool) -> Result<()> {
    let branch = engine.current_branch()?;
    println!("On branch {}", branch.as_str());

    if engine.has_uncommitted_changes()? {
        println!("Working tree: uncommitted changes");
    } else {
        println!("Working tree: clean");
    }

    let statuses = engine.status()?;
    if statuses.is_empty() {
        println!("No vendored subtrees recorded");
        return Ok(());
    }

    for status in statuses {
        println!("{}:", status.prefix);
        if let Some(binding) = &status.binding {
            println!("  upstream: {} @ {}", binding.url, binding.branch);
        }
        match &status.last_split {
            Some(split) => println!("  last sync: {}", &split[..7.min(split.len())]),
            None => println!("  last sync: marker not found in history"),
        }
        if let Some(synced) = status.last_synced {
            println!("  synced at: {}", synced.format("%Y-%m-%d %H:%M:%S UTC"));
        }

        if fetch {
            if let Some(binding) = &status.binding {
                match engine.check_behind(&status.prefix, &binding.url, &binding.branch) {
                    Ok(0) => println!("  behind: up to date"),
                    Ok(n) => println!("  behind: {n} commit(s)"),
                    Err(e) => println!("  behind: unknown ({e})"),
                }
            }
        }
    }

    Ok(())
}
