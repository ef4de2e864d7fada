//! core::types
//!
//! Validated input types for subtree operations.
//!
//! # Types
//!
//! - [`Prefix`] - Repository-relative subdirectory path being vendored
//! - [`BranchName`] - Validated Git branch name
//! - [`RemoteUrl`] - Validated upstream repository URL
//! - [`CommitMessage`] - Validated, sanitized commit message
//!
//! # Validation
//!
//! These types enforce validity at construction time. Every user-supplied
//! string crosses this boundary before it is used to build a subprocess
//! argument list or a filesystem path, so invalid values (path traversal,
//! argument injection, control bytes) are unrepresentable downstream.
//!
//! Validation rejects; sanitization silently alters. [`CommitMessage`]
//! applies both - it rejects structurally bad input, then strips residual
//! control bytes from what it accepts - because commit messages carry
//! arbitrary prose. Prefixes and branch names get no sanitization pass:
//! their character set already excludes everything a sanitizer would strip.
//!
//! # Examples
//!
//! ```
//! use subvend::core::types::{BranchName, Prefix, RemoteUrl, UrlPolicy};
//!
//! let prefix = Prefix::new("vendor/lib").unwrap();
//! assert_eq!(prefix.as_str(), "vendor/lib");
//!
//! let branch = BranchName::new("release/v1.2").unwrap();
//! assert_eq!(branch.as_str(), "release/v1.2");
//!
//! // Injection attempts fail at construction time
//! assert!(Prefix::new("../../etc").is_err());
//! assert!(BranchName::new("-rf").is_err());
//! assert!(RemoteUrl::new("javascript:alert(1)", UrlPolicy::Strict).is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Maximum length of a prefix or branch name.
const MAX_NAME_LEN: usize = 255;

/// Maximum length of a repository URL or commit message.
const MAX_TEXT_LEN: usize = 2048;

/// Errors from input validation.
///
/// Each variant names the rejected input class; the payload names the
/// specific violated rule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidateError {
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid repository URL: {0}")]
    InvalidUrl(String),

    #[error("invalid commit message: {0}")]
    InvalidMessage(String),
}

/// Characters permitted in prefixes and branch names.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-')
}

/// Strip NUL bytes and non-printable control characters from input.
///
/// Newlines and tabs survive; everything else below 0x20 is dropped.
/// This is applied in addition to validation, never as a substitute:
/// validation rejects bad input loudly, sanitization quietly normalizes
/// what validation accepted.
pub fn sanitize_input(input: &str) -> String {
    input
        .chars()
        .filter(|&c| c >= ' ' || c == '\n' || c == '\t')
        .collect()
}

/// Strip dangerous characters from a commit message, keeping newlines
/// so multi-line messages survive intact.
pub fn sanitize_commit_message(message: &str) -> String {
    sanitize_input(message)
}

/// A repository-relative path identifying the vendored subdirectory.
///
/// # Rules
///
/// - Cannot be empty or longer than 255 characters
/// - Restricted to `[A-Za-z0-9._/-]`
/// - Cannot contain `..` (path traversal)
/// - Cannot be absolute
///
/// # Example
///
/// ```
/// use subvend::core::types::Prefix;
///
/// let prefix = Prefix::new("vendor/lib").unwrap();
/// assert_eq!(prefix.as_str(), "vendor/lib");
///
/// assert!(Prefix::new("").is_err());
/// assert!(Prefix::new("/etc").is_err());
/// assert!(Prefix::new("a/../b").is_err());
/// assert!(Prefix::new("a;rm -rf /").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    /// Create a new validated prefix.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidPrefix` naming the violated rule.
    pub fn new(prefix: impl Into<String>) -> Result<Self, ValidateError> {
        let prefix = prefix.into();
        Self::validate(&prefix)?;
        Ok(Self(prefix))
    }

    fn validate(prefix: &str) -> Result<(), ValidateError> {
        if prefix.is_empty() {
            return Err(ValidateError::InvalidPrefix(
                "prefix cannot be empty".into(),
            ));
        }

        if prefix.len() > MAX_NAME_LEN {
            return Err(ValidateError::InvalidPrefix(format!(
                "prefix too long (max {MAX_NAME_LEN} characters)"
            )));
        }

        if let Some(c) = prefix.chars().find(|&c| !is_name_char(c)) {
            return Err(ValidateError::InvalidPrefix(format!(
                "prefix contains invalid character {c:?} \
                 (only alphanumerics, dots, underscores, hyphens, and slashes allowed)"
            )));
        }

        if prefix.contains("..") {
            return Err(ValidateError::InvalidPrefix(
                "prefix cannot contain path traversal sequences".into(),
            ));
        }

        if prefix.starts_with('/') {
            return Err(ValidateError::InvalidPrefix(
                "prefix cannot be an absolute path".into(),
            ));
        }

        Ok(())
    }

    /// Get the prefix as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Prefix {
    type Error = ValidateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Prefix> for String {
    fn from(prefix: Prefix) -> Self {
        prefix.0
    }
}

impl AsRef<str> for Prefix {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated Git branch name.
///
/// # Rules
///
/// - Cannot be empty or longer than 255 characters
/// - Restricted to `[A-Za-z0-9._/-]`
/// - Cannot start with `-` (would be parsed as a flag by git)
/// - Cannot end with `.`
/// - Cannot contain `..` or `//`
///
/// # Example
///
/// ```
/// use subvend::core::types::BranchName;
///
/// let branch = BranchName::new("feature/sync").unwrap();
/// assert_eq!(branch.as_str(), "feature/sync");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("-rf").is_err());
/// assert!(BranchName::new("a..b").is_err());
/// assert!(BranchName::new("a//b").is_err());
/// assert!(BranchName::new("trailing.").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidBranchName` naming the violated rule.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidateError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), ValidateError> {
        if name.is_empty() {
            return Err(ValidateError::InvalidBranchName(
                "branch name cannot be empty".into(),
            ));
        }

        if name.len() > MAX_NAME_LEN {
            return Err(ValidateError::InvalidBranchName(format!(
                "branch name too long (max {MAX_NAME_LEN} characters)"
            )));
        }

        if let Some(c) = name.chars().find(|&c| !is_name_char(c)) {
            return Err(ValidateError::InvalidBranchName(format!(
                "branch name contains invalid character {c:?}"
            )));
        }

        if name.starts_with('-') {
            return Err(ValidateError::InvalidBranchName(
                "branch name cannot start with '-'".into(),
            ));
        }

        if name.ends_with('.') {
            return Err(ValidateError::InvalidBranchName(
                "branch name cannot end with '.'".into(),
            ));
        }

        if name.contains("..") {
            return Err(ValidateError::InvalidBranchName(
                "branch name cannot contain '..'".into(),
            ));
        }

        if name.contains("//") {
            return Err(ValidateError::InvalidBranchName(
                "branch name cannot contain '//'".into(),
            ));
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = ValidateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Policy for which URL schemes a [`RemoteUrl`] accepts.
///
/// `file://` URLs point the fetch machinery at arbitrary local paths, so
/// they are opt-in: the CLI enables them behind an explicit flag and test
/// suites enable them directly. Network schemes are always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UrlPolicy {
    /// Allow `http`, `https`, `git`, and `ssh` only.
    #[default]
    Strict,
    /// Additionally allow `file` URLs (local mirrors, tests).
    AllowFile,
}

/// A validated upstream repository URL.
///
/// # Rules
///
/// - Cannot be empty or longer than 2048 characters
/// - Must parse as a URL
/// - Scheme must be `http`, `https`, `git`, or `ssh`
///   (`file` only under [`UrlPolicy::AllowFile`])
/// - `git` and `ssh` URLs must name a host
///
/// # Example
///
/// ```
/// use subvend::core::types::{RemoteUrl, UrlPolicy};
///
/// let url = RemoteUrl::new("https://example.com/lib.git", UrlPolicy::Strict).unwrap();
/// assert_eq!(url.scheme(), "https");
///
/// assert!(RemoteUrl::new("javascript:alert(1)", UrlPolicy::Strict).is_err());
/// assert!(RemoteUrl::new("file:///tmp/repo", UrlPolicy::Strict).is_err());
/// assert!(RemoteUrl::new("file:///tmp/repo", UrlPolicy::AllowFile).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteUrl {
    raw: String,
    scheme: String,
}

impl RemoteUrl {
    /// Create a new validated repository URL under the given policy.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidUrl` naming the violated rule.
    pub fn new(url: impl Into<String>, policy: UrlPolicy) -> Result<Self, ValidateError> {
        let raw = url.into();

        if raw.is_empty() {
            return Err(ValidateError::InvalidUrl(
                "repository URL cannot be empty".into(),
            ));
        }

        if raw.len() > MAX_TEXT_LEN {
            return Err(ValidateError::InvalidUrl(format!(
                "repository URL too long (max {MAX_TEXT_LEN} characters)"
            )));
        }

        let parsed = Url::parse(&raw)
            .map_err(|e| ValidateError::InvalidUrl(format!("unparseable URL: {e}")))?;

        let scheme = parsed.scheme().to_string();
        let allowed = match scheme.as_str() {
            "http" | "https" | "git" | "ssh" => true,
            "file" => policy == UrlPolicy::AllowFile,
            _ => false,
        };
        if !allowed {
            return Err(ValidateError::InvalidUrl(format!(
                "unsupported URL scheme '{scheme}' (allowed: http, https, git, ssh)"
            )));
        }

        if matches!(scheme.as_str(), "git" | "ssh")
            && parsed.host_str().map_or(true, str::is_empty)
        {
            return Err(ValidateError::InvalidUrl(
                "git/ssh URLs must name a host".into(),
            ));
        }

        Ok(Self { raw, scheme })
    }

    /// Get the URL as a string slice.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Get the URL scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }
}

impl AsRef<str> for RemoteUrl {
    fn as_ref(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// A validated, sanitized commit message.
///
/// Validation rejects empty, oversized, and control-byte-laden input;
/// the accepted text is then sanitized (NUL and non-printable control
/// characters stripped) before storage, so the message handed to the
/// object store is always printable prose plus newlines and tabs.
///
/// # Example
///
/// ```
/// use subvend::core::types::CommitMessage;
///
/// let msg = CommitMessage::new("Update vendored assets\n\nDetails here.").unwrap();
/// assert!(msg.as_str().starts_with("Update vendored assets"));
///
/// assert!(CommitMessage::new("").is_err());
/// assert!(CommitMessage::new("bad\x00message").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitMessage(String);

impl CommitMessage {
    /// Create a new validated commit message.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::InvalidMessage` naming the violated rule.
    pub fn new(message: impl Into<String>) -> Result<Self, ValidateError> {
        let message = message.into();

        if message.is_empty() {
            return Err(ValidateError::InvalidMessage(
                "commit message cannot be empty".into(),
            ));
        }

        if message.len() > MAX_TEXT_LEN {
            return Err(ValidateError::InvalidMessage(format!(
                "commit message too long (max {MAX_TEXT_LEN} characters)"
            )));
        }

        // \r survives validation for CRLF input; sanitization strips it.
        if message
            .chars()
            .any(|c| c.is_ascii_control() && !matches!(c, '\n' | '\t' | '\r'))
        {
            return Err(ValidateError::InvalidMessage(
                "commit message contains invalid control characters".into(),
            ));
        }

        Ok(Self(sanitize_commit_message(&message)))
    }

    /// Get the sanitized message as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for CommitMessage {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
