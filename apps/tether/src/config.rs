//! # Host Configuration
//!
//! Optional TOML config for the interpreter, pointed at with `-C`:
//!
//! ```toml
//! default_backend = "db/redb"
//! quiet = true
//! ```

use serde::Deserialize;
use std::path::Path;
use tether_core::TetherError;

/// Settings applied before any command runs.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostConfig {
    /// Backend used when `bind` is called without `-d`.
    pub default_backend: Option<String>,
    /// Suppress the startup banner.
    #[serde(default)]
    pub quiet: bool,
}

impl HostConfig {
    /// Load a config file. The path was given explicitly, so a missing or
    /// malformed file is a usage error.
    pub fn load(path: &Path) -> Result<Self, TetherError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TetherError::Usage(format!("cannot read config {}: {e}", path.display()))
        })?;
        toml::from_str(&text).map_err(|e| {
            TetherError::Usage(format!("invalid config {}: {e}", path.display()))
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
