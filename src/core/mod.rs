//! core
//!
//! Domain types and shared infrastructure for the subtree engine.
//!
//! - [`types`] - validated input newtypes and sanitizers
//! - [`pathcheck`] - memoized filesystem path validation
//! - [`paths`] - routing for subvend storage locations
//! - [`lock`] - single-writer repository lock
//! - [`config`] - vendored-subtree binding configuration

pub mod config;
pub mod lock;
pub mod pathcheck;
pub mod paths;
pub mod types;
