//! # Backend Registry
//!
//! Maps backend type identifiers to opener functions. Call sites never
//! compare engine names themselves; adding a backend means adding a row
//! here.

use crate::store::{KvStore, RedbStore};
use crate::types::{AccessMode, TetherError};
use std::path::Path;

/// Identifier accepted by `bind -d` for the redb engine.
pub const REDB_BACKEND: &str = "db/redb";

/// Opens a store of one backend kind.
pub type OpenFn = fn(&Path, AccessMode) -> Result<Box<dyn KvStore>, TetherError>;

/// Registered backends.
static BACKENDS: &[(&str, OpenFn)] = &[(REDB_BACKEND, open_redb)];

fn open_redb(path: &Path, mode: AccessMode) -> Result<Box<dyn KvStore>, TetherError> {
    Ok(Box::new(RedbStore::open(path, mode)?))
}

/// Look up `backend` and open the store behind it.
///
/// Unknown identifiers are rejected before any I/O happens.
pub fn open_backend(
    backend: &str,
    path: &Path,
    mode: AccessMode,
) -> Result<Box<dyn KvStore>, TetherError> {
    let opener = BACKENDS
        .iter()
        .find(|(name, _)| *name == backend)
        .map(|(_, open)| *open)
        .ok_or_else(|| TetherError::UnsupportedBackend(backend.to_string()))?;
    opener(path, mode)
}

/// Identifiers of every registered backend.
pub fn backend_names() -> impl Iterator<Item = &'static str> {
    BACKENDS.iter().map(|(name, _)| *name)
}

// =============================================================================
// TESTS
// =============================================================================
