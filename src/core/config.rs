//! core::config
//!
//! Vendored-subtree binding configuration.
//!
//! # Storage
//!
//! Located at `<git_dir>/subvend/config.toml`. Records, per vendored
//! prefix, the upstream repository and branch it tracks, so pull/push/
//! status can run without the caller re-supplying the full triple. The
//! commit-message marker remains the durable provenance record; this file
//! is a convenience binding and can be regenerated by re-running `add`.
//!
//! # Validation
//!
//! Values are validated after parsing: keys must be valid prefixes and
//! branches must satisfy the branch grammar, so a hand-edited config
//! cannot smuggle unvalidated strings into the engine.
//!
//! # Example
//!
//! ```toml
//! [subtrees."vendor/lib"]
//! url = "https://example.com/lib.git"
//! branch = "main"
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::SubvendPaths;
use crate::core::types::{BranchName, Prefix, ValidateError};

/// Errors from configuration handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but cannot be read or written.
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML.
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized.
    #[error("config encode error: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A parsed value fails validation.
    #[error("invalid config value: {0}")]
    InvalidValue(#[from] ValidateError),
}

/// Upstream binding for one vendored prefix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct UpstreamBinding {
    /// Upstream repository URL.
    pub url: String,
    /// Upstream branch being tracked.
    pub branch: String,
}

/// Repository-scoped subvend configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Vendored prefix -> upstream binding.
    pub subtrees: BTreeMap<String, UpstreamBinding>,
}

impl RepoConfig {
    /// Load the config from `<git_dir>/subvend/config.toml`.
    ///
    /// A missing file is an empty config, not an error.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be read,
    /// parsed, or validated.
    pub fn load(paths: &SubvendPaths) -> Result<Self, ConfigError> {
        let path = paths.config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Persist the config to `<git_dir>/subvend/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` on serialization or write failure.
    pub fn save(&self, paths: &SubvendPaths) -> Result<(), ConfigError> {
        paths.ensure_dirs()?;
        let text = toml::to_string_pretty(self)?;
        std::fs::write(paths.config_path(), text)?;
        Ok(())
    }

    /// Validate all keys and values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the violated rule.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (prefix, binding) in &self.subtrees {
            Prefix::new(prefix.clone())?;
            BranchName::new(binding.branch.clone())?;
        }
        Ok(())
    }

    /// Look up the binding for a prefix.
    pub fn binding(&self, prefix: &Prefix) -> Option<&UpstreamBinding> {
        self.subtrees.get(prefix.as_str())
    }

    /// Record (or replace) the binding for a prefix.
    pub fn bind(&mut self, prefix: &Prefix, url: &str, branch: &BranchName) {
        self.subtrees.insert(
            prefix.as_str().to_string(),
            UpstreamBinding {
                url: url.to_string(),
                branch: branch.as_str().to_string(),
            },
        );
    }
}
