//! # Store Backend
//!
//! The black-box persistent KV surface the bridge relies on, and its redb
//! implementation.
//!
//! The bridge only ever touches a store through the [`KvStore`] primitives:
//! existence-check, fetch, upsert, delete, first-key, next-key, compact.
//! Everything else (on-disk format, locking, durability) belongs to the
//! engine. redb provides the single-writer/multi-reader exclusivity the
//! caching protocol depends on, and durable commits give each mutation the
//! synchronous-write semantics the binding is opened with.

use crate::types::{AccessMode, TetherError};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use std::ops::Bound;
use std::path::Path;

/// Single table holding the mapping's entries: key string -> value string.
const ENTRIES: TableDefinition<&str, &str> = TableDefinition::new("entries");

// =============================================================================
// KVSTORE TRAIT
// =============================================================================

/// The persistent key-value primitives the bridge is written against.
///
/// Iteration order is engine-defined: `first_key`/`next_key` walk keys in
/// whatever order the engine keeps them, which need not match insertion
/// order of the in-memory view.
pub trait KvStore {
    /// Does the store contain `key`?
    fn exists(&self, key: &str) -> Result<bool, TetherError>;

    /// Fetch the value stored under `key`, if any.
    fn fetch(&self, key: &str) -> Result<Option<String>, TetherError>;

    /// Replace-or-insert `key` -> `value`.
    fn upsert(&mut self, key: &str, value: &str) -> Result<(), TetherError>;

    /// Remove `key` if present.
    fn delete(&mut self, key: &str) -> Result<(), TetherError>;

    /// The first key in engine iteration order, if the store is non-empty.
    fn first_key(&self) -> Result<Option<String>, TetherError>;

    /// The key following `after` in engine iteration order.
    fn next_key(&self, after: &str) -> Result<Option<String>, TetherError>;

    /// Reorganize the store, reclaiming space after bulk deletion.
    fn compact(&mut self) -> Result<(), TetherError>;

    /// Number of entries currently stored.
    fn len(&self) -> Result<usize, TetherError>;

    /// True when the store holds no entries.
    fn is_empty(&self) -> Result<bool, TetherError> {
        Ok(self.len()? == 0)
    }
}

// =============================================================================
// REDB IMPLEMENTATION
// =============================================================================

fn store_err(e: impl std::fmt::Display) -> TetherError {
    TetherError::Store(e.to_string())
}

/// A store backed by a redb database file.
pub struct RedbStore {
    db: Database,
    mode: AccessMode,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open the database at `path`.
    ///
    /// `ReadWriteCreate` creates the file (and the entries table) if
    /// missing. `ReadOnly` requires an existing file and refuses mutation
    /// at this layer; a read-only opener never creates anything on disk.
    pub fn open(path: &Path, mode: AccessMode) -> Result<Self, TetherError> {
        let open_err = |reason: String| TetherError::BackendOpen {
            path: path.to_path_buf(),
            reason,
        };

        let db = match mode {
            AccessMode::ReadWriteCreate => Database::create(path),
            AccessMode::ReadOnly => Database::open(path),
        }
        .map_err(|e| open_err(e.to_string()))?;

        if mode == AccessMode::ReadWriteCreate {
            // Make sure the entries table exists so later reads don't have
            // to special-case a brand-new file.
            let write_txn = db.begin_write().map_err(|e| open_err(e.to_string()))?;
            let _ = write_txn
                .open_table(ENTRIES)
                .map_err(|e| open_err(e.to_string()))?;
            write_txn.commit().map_err(|e| open_err(e.to_string()))?;
        }

        Ok(Self { db, mode })
    }

    fn ensure_writable(&self) -> Result<(), TetherError> {
        if self.mode.is_read_only() {
            return Err(TetherError::Store("store opened read-only".to_string()));
        }
        Ok(())
    }
}

impl KvStore for RedbStore {
    fn exists(&self, key: &str) -> Result<bool, TetherError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            // Read-only open of a database that never had entries written.
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(false),
            Err(e) => return Err(store_err(e)),
        };
        Ok(table.get(key).map_err(store_err)?.is_some())
    }

    fn fetch(&self, key: &str) -> Result<Option<String>, TetherError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        Ok(table
            .get(key)
            .map_err(store_err)?
            .map(|guard| guard.value().to_string()))
    }

    fn upsert(&mut self, key: &str, value: &str) -> Result<(), TetherError> {
        self.ensure_writable()?;
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(ENTRIES).map_err(store_err)?;
            table.insert(key, value).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), TetherError> {
        self.ensure_writable()?;
        let write_txn = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = write_txn.open_table(ENTRIES).map_err(store_err)?;
            table.remove(key).map_err(store_err)?;
        }
        write_txn.commit().map_err(store_err)?;
        Ok(())
    }

    fn first_key(&self) -> Result<Option<String>, TetherError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        let mut iter = table.iter().map_err(store_err)?;
        match iter.next() {
            Some(entry) => {
                let (key, _) = entry.map_err(store_err)?;
                Ok(Some(key.value().to_string()))
            }
            None => Ok(None),
        }
    }

    fn next_key(&self, after: &str) -> Result<Option<String>, TetherError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(store_err(e)),
        };
        let mut range = table
            .range::<&str>((Bound::Excluded(after), Bound::Unbounded))
            .map_err(store_err)?;
        match range.next() {
            Some(entry) => {
                let (key, _) = entry.map_err(store_err)?;
                Ok(Some(key.value().to_string()))
            }
            None => Ok(None),
        }
    }

    fn compact(&mut self) -> Result<(), TetherError> {
        self.ensure_writable()?;
        self.db.compact().map_err(store_err)?;
        Ok(())
    }

    fn len(&self) -> Result<usize, TetherError> {
        let read_txn = self.db.begin_read().map_err(store_err)?;
        let table = match read_txn.open_table(ENTRIES) {
            Ok(table) => table,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(0),
            Err(e) => return Err(store_err(e)),
        };
        Ok(table.len().map_err(store_err)? as usize)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn open_rw(dir: &tempfile::TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("t.db"), AccessMode::ReadWriteCreate).expect("open")
    }

    #[test]
    fn upsert_fetch_delete_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_rw(&dir);

        store.upsert("a", "1").expect("upsert");
        assert!(store.exists("a").expect("exists"));
        assert_eq!(store.fetch("a").expect("fetch").as_deref(), Some("1"));

        store.upsert("a", "2").expect("replace");
        assert_eq!(store.fetch("a").expect("fetch").as_deref(), Some("2"));

        store.delete("a").expect("delete");
        assert!(!store.exists("a").expect("exists"));
        assert!(store.is_empty().expect("is_empty"));
    }

    #[test]
    fn first_and_next_walk_every_key() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut store = open_rw(&dir);
        for key in ["c", "a", "b"] {
            store.upsert(key, "v").expect("upsert");
        }

        let mut seen = Vec::new();
        let mut cursor = store.first_key().expect("first");
        while let Some(key) = cursor {
            cursor = store.next_key(&key).expect("next");
            seen.push(key);
        }
        seen.sort();
        assert_eq!(seen, ["a", "b", "c"]);
        assert_eq!(store.len().expect("len"), 3);
    }

    #[test]
    fn read_only_open_requires_existing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("missing.db");
        let result = RedbStore::open(&missing, AccessMode::ReadOnly);
        assert!(matches!(result, Err(TetherError::BackendOpen { .. })));
        // Opening read-only must not create the resource.
        assert!(!missing.exists());
    }

    #[test]
    fn read_only_store_refuses_writes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("t.db");
        {
            let mut store =
                RedbStore::open(&path, AccessMode::ReadWriteCreate).expect("create");
            store.upsert("a", "1").expect("upsert");
        }
        let mut store = RedbStore::open(&path, AccessMode::ReadOnly).expect("open ro");
        assert_eq!(store.fetch("a").expect("fetch").as_deref(), Some("1"));
        assert!(matches!(
            store.upsert("b", "2"),
            Err(TetherError::Store(_))
        ));
        assert!(matches!(store.delete("a"), Err(TetherError::Store(_))));
    }
}
