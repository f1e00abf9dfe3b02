//! # Core Type Definitions
//!
//! Access modes and the error taxonomy shared by every layer of the bridge.
//!
//! ## Error policy
//!
//! - Validation errors (`Usage`, `UnsupportedBackend`) fail fast, before any
//!   store I/O happens.
//! - Setup I/O errors (`BackendOpen`, `DescriptorExhausted`) are recovered
//!   locally with explicit cleanup so no connection or descriptor leaks.
//! - Per-key mirror errors during set/delete are NOT represented here at
//!   all: the mapping layer swallows them (logging a warning) because the
//!   in-memory state stays authoritative for the life of a binding.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// ACCESS MODE
// =============================================================================

/// How the backing store is opened by `bind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Open an existing store for reading. The host additionally marks the
    /// binding read-only and refuses writes to it.
    ReadOnly,
    /// Open for reading and writing, creating the store if missing.
    ReadWriteCreate,
}

impl AccessMode {
    /// True for [`AccessMode::ReadOnly`].
    #[must_use]
    pub fn is_read_only(self) -> bool {
        matches!(self, Self::ReadOnly)
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Errors surfaced by the bridge.
#[derive(Debug, Error)]
pub enum TetherError {
    /// Missing or invalid command arguments.
    #[error("{0}")]
    Usage(String),

    /// The requested backend identifier is not in the registry.
    #[error("unsupported backend type `{0}`")]
    UnsupportedBackend(String),

    /// The store engine failed to open the resource.
    #[error("error opening database file {path}: {reason}")]
    BackendOpen {
        /// The resource that could not be opened.
        path: PathBuf,
        /// Engine-reported reason.
        reason: String,
    },

    /// No free slot in the host descriptor table. The just-opened store
    /// connection has already been closed when this is returned.
    #[error("cannot register store descriptor: descriptor table exhausted")]
    DescriptorExhausted,

    /// A write or removal was attempted on a read-only binding.
    #[error("{0}: read-only binding")]
    ReadOnly(String),

    /// Unbind target does not exist.
    #[error("cannot unbind {0}")]
    UnbindTarget(String),

    /// Unbind target exists but is not a tethered mapping.
    #[error("not a tethered mapping: {0}")]
    NotTethered(String),

    /// A per-key operation referenced a variable that does not exist.
    #[error("no such variable: {0}")]
    NoSuchVariable(String),

    /// An engine-level failure from the underlying store.
    #[error("store error: {0}")]
    Store(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_mode_read_only_flag() {
        assert!(AccessMode::ReadOnly.is_read_only());
        assert!(!AccessMode::ReadWriteCreate.is_read_only());
    }

    #[test]
    fn errors_render_with_context() {
        let err = TetherError::BackendOpen {
            path: PathBuf::from("/tmp/t.db"),
            reason: "permission denied".to_string(),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("/tmp/t.db"));
        assert!(rendered.contains("permission denied"));
    }
}
