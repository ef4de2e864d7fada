//! git::process
//!
//! Bounded-timeout executor for the git binary.
//!
//! # Architecture
//!
//! Most operations run against the object store via `git2`, but history
//! splitting (`git subtree split`) is deliberately left to the git binary,
//! and the resulting ref is pushed the same way. This module is the only
//! place a subprocess is spawned: arguments reaching it have already passed
//! validation, the child is killed when its time budget expires, and a
//! non-zero exit is captured as data ([`ExecStatus::Failed`] with the code
//! and output) rather than collapsed into a bare pass/fail. git reuses exit
//! code 128 for every fatal error, so no meaning is read into specific
//! codes here; benign-empty-history handling lives with the object-store
//! queries in [`crate::git::interface`].

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

/// Time budget for local metadata queries (rev-parse, status).
pub const FAST_TIMEOUT: Duration = Duration::from_secs(5);

/// Time budget for local mutations (commit, reset, tree surgery).
pub const LOCAL_TIMEOUT: Duration = Duration::from_secs(30);

/// Time budget for operations that talk to a network remote (fetch, push)
/// or walk full history (subtree split).
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(300);

/// How often the executor polls a running child.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Errors from subprocess execution.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The git binary could not be spawned at all.
    #[error("failed to spawn git {command}: {source}")]
    Spawn {
        /// The argument list that failed to spawn
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The child exceeded its time budget and was killed.
    #[error("git {command} timed out after {}s", .timeout.as_secs())]
    TimedOut {
        /// The argument list that timed out
        command: String,
        /// The budget that was exceeded
        timeout: Duration,
    },

    /// The child exited non-zero; captured output attached verbatim.
    #[error("git {command} failed{}: {output}", .code.map(|c| format!(" (exit {c})")).unwrap_or_default())]
    Failed {
        /// The argument list that failed
        command: String,
        /// Exit code, if the process was not signal-killed
        code: Option<i32>,
        /// Combined stdout and stderr
        output: String,
    },

    /// IO failure while waiting on or reading from the child.
    #[error("i/o error running git {command}: {source}")]
    Io {
        /// The argument list being run
        command: String,
        /// Underlying IO error
        source: std::io::Error,
    },
}

/// Result of a completed git invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Exit code 0.
    Success,
    /// Any non-zero exit (code is None when signal-killed).
    Failed(Option<i32>),
}

/// Captured output of a completed git invocation.
#[derive(Debug)]
pub struct ExecOutput {
    /// Classified exit status.
    pub status: ExecStatus,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

impl ExecOutput {
    /// Combined stdout + stderr for diagnostics.
    pub fn combined(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&self.stderr);
        }
        out
    }

    /// Whether the invocation exited zero.
    pub fn success(&self) -> bool {
        self.status == ExecStatus::Success
    }
}

/// Executor for git subprocesses in a fixed working directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    /// Working directory for spawned processes.
    workdir: PathBuf,
}

impl GitCli {
    /// Create an executor running git inside `workdir`.
    pub fn new(workdir: &Path) -> Self {
        Self {
            workdir: workdir.to_path_buf(),
        }
    }

    /// Run git with the given (already validated) arguments.
    ///
    /// Returns captured output with a classified status; a non-zero exit is
    /// data here, not an error. The child is killed if `timeout` elapses.
    ///
    /// # Errors
    ///
    /// - [`ExecError::Spawn`] if the binary cannot be started
    /// - [`ExecError::TimedOut`] if the budget is exceeded
    /// - [`ExecError::Io`] on wait/read failures
    pub fn run(&self, args: &[&str], timeout: Duration) -> Result<ExecOutput, ExecError> {
        let command = args.join(" ");

        let mut child = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: command.clone(),
                source,
            })?;

        let output = match wait_with_timeout(&mut child, timeout, &command) {
            Ok(output) => output,
            Err(e) => {
                // Reap the child so a timed-out process does not linger
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        };

        let status = match output.status.code() {
            Some(0) => ExecStatus::Success,
            code => ExecStatus::Failed(code),
        };

        Ok(ExecOutput {
            status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run git and require a zero exit, returning trimmed stdout.
    ///
    /// # Errors
    ///
    /// In addition to [`Self::run`]'s errors, returns [`ExecError::Failed`]
    /// with combined output on any non-zero exit.
    pub fn run_checked(&self, args: &[&str], timeout: Duration) -> Result<String, ExecError> {
        let output = self.run(args, timeout)?;
        match output.status {
            ExecStatus::Success => Ok(output.stdout.trim().to_string()),
            ExecStatus::Failed(code) => Err(ExecError::Failed {
                command: args.join(" "),
                code,
                output: output.combined(),
            }),
        }
    }
}

/// Poll a child until it exits or the budget runs out.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
    command: &str,
) -> Result<Output, ExecError> {
    let start = Instant::now();

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = drain(child.stdout.take(), command)?;
                let stderr = drain(child.stderr.take(), command)?;
                return Ok(Output {
                    status,
                    stdout,
                    stderr,
                });
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    return Err(ExecError::TimedOut {
                        command: command.to_string(),
                        timeout,
                    });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(ExecError::Io {
                    command: command.to_string(),
                    source,
                })
            }
        }
    }
}

/// Read a captured pipe to the end.
fn drain<R: Read>(pipe: Option<R>, command: &str) -> Result<Vec<u8>, ExecError> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).map_err(|source| ExecError::Io {
            command: command.to_string(),
            source,
        })?;
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_repo(dir: &Path) {
        let cli = GitCli::new(dir);
        cli.run_checked(&["init"], FAST_TIMEOUT).unwrap();
        cli.run_checked(&["config", "user.email", "test@example.com"], FAST_TIMEOUT)
            .unwrap();
        cli.run_checked(&["config", "user.name", "Test User"], FAST_TIMEOUT)
            .unwrap();
    }

    #[test]
    fn run_captures_stdout() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());

        let cli = GitCli::new(temp.path());
        let version = cli.run_checked(&["--version"], FAST_TIMEOUT).unwrap();
        assert!(version.starts_with("git version"));
    }

    #[test]
    fn nonzero_exit_is_classified_not_errored() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());

        let cli = GitCli::new(temp.path());
        let output = cli
            .run(&["rev-parse", "--verify", "no-such-ref"], FAST_TIMEOUT)
            .unwrap();
        // git dies with 128 here; that is a failure code like any other
        assert_eq!(output.status, ExecStatus::Failed(Some(128)));
    }

    #[test]
    fn fatal_exit_is_a_failure_not_a_success() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());

        // git log in a repository with no commits also exits 128
        let cli = GitCli::new(temp.path());
        let output = cli.run(&["log", "--oneline"], FAST_TIMEOUT).unwrap();
        assert_eq!(output.status, ExecStatus::Failed(Some(128)));
        assert!(!output.success());
    }

    #[test]
    fn run_checked_attaches_output_on_failure() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());

        let cli = GitCli::new(temp.path());
        let err = cli
            .run_checked(&["rev-parse", "--verify", "no-such-ref"], FAST_TIMEOUT)
            .unwrap_err();
        match err {
            ExecError::Failed { command, output, .. } => {
                assert!(command.contains("rev-parse"));
                assert!(!output.is_empty());
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn combined_output_joins_streams() {
        let output = ExecOutput {
            status: ExecStatus::Success,
            stdout: "out".to_string(),
            stderr: "err".to_string(),
        };
        assert_eq!(output.combined(), "out\nerr");

        let only_err = ExecOutput {
            status: ExecStatus::Failed(Some(1)),
            stdout: String::new(),
            stderr: "err".to_string(),
        };
        assert_eq!(only_err.combined(), "err");
    }
}
