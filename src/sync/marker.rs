//! sync::marker
//!
//! Commit-message provenance markers.
//!
//! Every synchronization commit carries a trailer block naming the vendored
//! prefix and the upstream commit its content came from:
//!
//! ```text
//! Squashed 'vendor/lib' content from commit 1a2b3c4
//!
//! git-subtree-dir: vendor/lib
//! git-subtree-split: 1a2b3c4d...
//! ```
//!
//! The format is byte-compatible with the `git subtree` porcelain, so its
//! split machinery recognizes our sync points (and ours recognizes history
//! vendored by it). The marker in history is the durable record of which
//! prefixes are vendored; no state outside the object graph is needed to
//! answer "is this prefix a subtree".

use crate::core::types::Prefix;

/// Trailer key naming the vendored prefix.
const DIR_KEY: &str = "git-subtree-dir";

/// Trailer key naming the upstream commit.
const SPLIT_KEY: &str = "git-subtree-split";

/// Abbreviated-OID length used in message summaries.
const SHORT_OID_LEN: usize = 7;

/// A parsed provenance marker from a synchronization commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtreeMarker {
    /// The vendored prefix the commit synchronized.
    pub prefix: String,
    /// The upstream commit the content came from.
    pub split: String,
}

impl SubtreeMarker {
    /// Extract a marker from a commit message, if one is present.
    ///
    /// Both trailer lines must appear; a message carrying only one of the
    /// two is not a marker.
    pub fn parse(message: &str) -> Option<Self> {
        let mut prefix = None;
        let mut split = None;

        for line in message.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix(DIR_KEY) {
                if let Some(value) = value.strip_prefix(':') {
                    prefix = Some(value.trim().to_string());
                }
            } else if let Some(value) = line.strip_prefix(SPLIT_KEY) {
                if let Some(value) = value.strip_prefix(':') {
                    split = Some(value.trim().to_string());
                }
            }
        }

        Some(Self {
            prefix: prefix?,
            split: split?,
        })
    }
}

/// The exact trailer line that identifies sync commits for a prefix.
///
/// History search matches this against whole trimmed message lines, so a
/// prefix that happens to be a substring of another (`lib` vs `lib2`)
/// cannot produce a false positive.
pub fn dir_line(prefix: &Prefix) -> String {
    format!("{}: {}", DIR_KEY, prefix.as_str())
}

/// Abbreviate an OID for message summaries.
pub fn short(oid: &git2::Oid) -> String {
    let full = oid.to_string();
    full[..SHORT_OID_LEN.min(full.len())].to_string()
}

/// Commit message for an initial vendoring of `prefix`.
pub fn add_message(prefix: &Prefix, upstream: git2::Oid) -> String {
    format!(
        "Squashed '{}' content from commit {}\n\n{}: {}\n{}: {}",
        prefix.as_str(),
        short(&upstream),
        DIR_KEY,
        prefix.as_str(),
        SPLIT_KEY,
        upstream,
    )
}

/// Commit message for an update pull of `prefix`.
pub fn pull_message(prefix: &Prefix, upstream: git2::Oid) -> String {
    format!(
        "Squashed '{}' changes from {}\n\n{}: {}\n{}: {}",
        prefix.as_str(),
        short(&upstream),
        DIR_KEY,
        prefix.as_str(),
        SPLIT_KEY,
        upstream,
    )
}
