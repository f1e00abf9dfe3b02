//! # Lazy Mapping
//!
//! [`TetherMap`] is the live associative container exposed to the host,
//! backed by per-key [`Slot`]s and (while bound) a [`BackendHandle`].
//!
//! Reads lazily fill slots from the store; writes update the slot first and
//! then mirror to the store best-effort. Once the handle is gone the
//! mapping degrades gracefully to an ordinary in-memory container.

use crate::handle::{BackendHandle, DescriptorTable};
use crate::interrupts::CriticalSection;
use crate::slot::Slot;
use crate::types::TetherError;
use std::collections::BTreeMap;

/// Result of consulting the store for one key.
enum Probe {
    Present(String),
    Absent,
    Failed,
}

/// The live mapping: slots keyed by name plus an optional store connection.
#[derive(Debug)]
pub struct TetherMap {
    slots: BTreeMap<String, Slot>,
    handle: Option<BackendHandle>,
}

impl TetherMap {
    /// A mapping wired to an open store connection.
    #[must_use]
    pub fn bound(handle: BackendHandle) -> Self {
        Self {
            slots: BTreeMap::new(),
            handle: Some(handle),
        }
    }

    /// A plain, store-less mapping (the degraded shape).
    #[must_use]
    pub fn plain() -> Self {
        Self {
            slots: BTreeMap::new(),
            handle: None,
        }
    }

    /// Is a store connection currently attached?
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    /// Number of slots materialized so far (observed keys, not store size).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Ensure a slot exists for `key`.
    ///
    /// Every key the lookup machinery is asked about becomes a legitimate
    /// entry, stale and valueless until [`get`](Self::get) loads it, so
    /// the container's shape can cover every key the store contains without
    /// eager loading. This never reports "not found".
    pub fn materialize(&mut self, key: &str) {
        if !self.slots.contains_key(key) {
            self.slots.insert(key.to_string(), Slot::new());
        }
    }

    /// Read `key`, lazily filling its slot from the store.
    ///
    /// A fresh slot answers from cache: its value, or the empty string for
    /// a key confirmed absent. Otherwise the store is consulted once and
    /// the result (value or absence) is cached fresh. Pure cache-fill; the
    /// store is never written.
    ///
    /// Absence is cached for the life of the binding: if an external
    /// process inserts the key later, this binding will not see it. The
    /// store's single-writer enforcement makes that sequence impossible
    /// while the binding holds the writer side; with a read-only binding it
    /// is a documented limitation.
    pub fn get(&mut self, key: &str) -> String {
        self.materialize(key);
        let fresh = self.slots.get(key).is_some_and(Slot::is_fresh);
        if fresh || self.handle.is_none() {
            return self
                .slots
                .get(key)
                .and_then(Slot::value)
                .unwrap_or_default()
                .to_string();
        }

        match self.probe_store(key) {
            Probe::Present(value) => {
                if let Some(slot) = self.slots.get_mut(key) {
                    slot.fill(value.as_str());
                }
                value
            }
            Probe::Absent => {
                if let Some(slot) = self.slots.get_mut(key) {
                    slot.confirm_absent();
                }
                String::new()
            }
            // Slot stays stale so a later read retries.
            Probe::Failed => String::new(),
        }
    }

    fn probe_store(&self, key: &str) -> Probe {
        let Some(handle) = self.handle.as_ref() else {
            return Probe::Absent;
        };
        match handle.store().exists(key) {
            Ok(false) => Probe::Absent,
            Ok(true) => match handle.store().fetch(key) {
                Ok(value) => Probe::Present(value.unwrap_or_default()),
                Err(e) => {
                    tracing::warn!(key, error = %e, "store fetch failed");
                    Probe::Failed
                }
            },
            Err(e) => {
                tracing::warn!(key, error = %e, "store lookup failed");
                Probe::Failed
            }
        }
    }

    /// Write or unset `key`.
    ///
    /// The slot is updated first: a concrete value is cached fresh, an
    /// unset clears the slot and marks it stale so the next read re-queries
    /// the store, matching deletion. The store mirror (upsert or delete) is
    /// best-effort: failures are logged and swallowed, and the in-memory
    /// state stays authoritative for the rest of the binding's lifetime.
    pub fn set(&mut self, key: &str, value: Option<&str>) {
        let slot = self.slots.entry(key.to_string()).or_default();
        match value {
            Some(v) => slot.fill(v),
            None => slot.clear(),
        }

        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let mirrored = match value {
            Some(v) => handle.store_mut().upsert(key, v),
            None => handle.store_mut().delete(key),
        };
        if let Err(e) = mirrored {
            tracing::warn!(key, error = %e, "store mirror failed; cache stays authoritative");
        }
    }

    /// Unset `key`. Defined as `set(key, None)`.
    pub fn delete(&mut self, key: &str) {
        self.set(key, None);
    }

    /// Visit every key of the mapping with its value.
    ///
    /// Bound: walks the store's keys in engine iteration order (not the
    /// insertion order of the in-memory view), materializing and loading
    /// each slot on the way. Degraded: walks the slots that hold values.
    /// Never writes.
    pub fn for_each(
        &mut self,
        mut visit: impl FnMut(&str, &str),
    ) -> Result<(), TetherError> {
        if self.handle.is_none() {
            for (key, slot) in &self.slots {
                if let Some(value) = slot.value() {
                    visit(key, value);
                }
            }
            return Ok(());
        }

        let mut cursor = match self.handle.as_ref() {
            Some(handle) => handle.store().first_key()?,
            None => None,
        };
        while let Some(key) = cursor.take() {
            let value = self.get(&key);
            visit(&key, &value);
            cursor = match self.handle.as_ref() {
                Some(handle) => handle.store().next_key(&key)?,
                None => None,
            };
        }
        Ok(())
    }

    /// Replace the mapping's entire contents (the bulk replace protocol).
    ///
    /// Degraded mappings are replaced purely in memory. Bound mappings
    /// drain the store completely (re-querying the first remaining key
    /// after every deletion, since deleting may invalidate iteration state),
    /// compact it, and, unless `entries` is `None` or empty, upsert every
    /// new entry. Slots are cleared and repopulated lazily on later reads.
    /// Store-mutating steps run inside critical sections; mutation failures
    /// are logged, and a failing drain stops early rather than spin.
    pub fn replace_all(&mut self, entries: Option<BTreeMap<String, String>>) {
        self.slots.clear();

        if self.handle.is_none() {
            if let Some(entries) = entries {
                for (key, value) in entries {
                    let mut slot = Slot::new();
                    slot.fill(value);
                    self.slots.insert(key, slot);
                }
            }
            return;
        }

        loop {
            let Some(handle) = self.handle.as_mut() else {
                return;
            };
            let key = match handle.store().first_key() {
                Ok(Some(key)) => key,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "store drain aborted");
                    return;
                }
            };
            let _guard = CriticalSection::enter();
            if let Err(e) = handle.store_mut().delete(&key) {
                tracing::warn!(key = key.as_str(), error = %e, "store delete failed during drain");
                return;
            }
        }

        if let Some(handle) = self.handle.as_mut() {
            let _guard = CriticalSection::enter();
            if let Err(e) = handle.store_mut().compact() {
                tracing::warn!(error = %e, "store compaction failed after drain");
            }
        }

        let Some(entries) = entries else {
            return;
        };
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        for (key, value) in &entries {
            let _guard = CriticalSection::enter();
            if let Err(e) = handle.store_mut().upsert(key, value) {
                tracing::warn!(key = key.as_str(), error = %e, "store seed failed");
            }
        }
    }

    /// Revert to a plain container: close the store connection and
    /// deregister its descriptor. Slots keep whatever they cached and no
    /// further store interaction happens. The handle is gone before any
    /// slot teardown can run, so teardown never sees a dead connection.
    pub fn degrade(&mut self, descriptors: &mut DescriptorTable) {
        if let Some(handle) = self.handle.take() {
            handle.close(descriptors);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::KvStore;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    /// In-memory store double, counting lookups so tests can prove the
    /// cache answered without a store query.
    #[derive(Default)]
    struct MemStore {
        entries: BTreeMap<String, String>,
        lookups: Rc<Cell<u32>>,
    }

    impl KvStore for MemStore {
        fn exists(&self, key: &str) -> Result<bool, TetherError> {
            self.lookups.set(self.lookups.get() + 1);
            Ok(self.entries.contains_key(key))
        }
        fn fetch(&self, key: &str) -> Result<Option<String>, TetherError> {
            Ok(self.entries.get(key).cloned())
        }
        fn upsert(&mut self, key: &str, value: &str) -> Result<(), TetherError> {
            self.entries.insert(key.to_string(), value.to_string());
            Ok(())
        }
        fn delete(&mut self, key: &str) -> Result<(), TetherError> {
            self.entries.remove(key);
            Ok(())
        }
        fn first_key(&self) -> Result<Option<String>, TetherError> {
            Ok(self.entries.keys().next().cloned())
        }
        fn next_key(&self, after: &str) -> Result<Option<String>, TetherError> {
            Ok(self
                .entries
                .range::<str, _>((
                    std::ops::Bound::Excluded(after),
                    std::ops::Bound::Unbounded,
                ))
                .map(|(k, _)| k.clone())
                .next())
        }
        fn compact(&mut self) -> Result<(), TetherError> {
            Ok(())
        }
        fn len(&self) -> Result<usize, TetherError> {
            Ok(self.entries.len())
        }
    }

    /// Store double where every operation fails.
    struct DeadStore;

    impl KvStore for DeadStore {
        fn exists(&self, _key: &str) -> Result<bool, TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn fetch(&self, _key: &str) -> Result<Option<String>, TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn upsert(&mut self, _key: &str, _value: &str) -> Result<(), TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn delete(&mut self, _key: &str) -> Result<(), TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn first_key(&self) -> Result<Option<String>, TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn next_key(&self, _after: &str) -> Result<Option<String>, TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn compact(&mut self) -> Result<(), TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
        fn len(&self) -> Result<usize, TetherError> {
            Err(TetherError::Store("unreachable".to_string()))
        }
    }

    fn bound_map(store: impl KvStore + 'static) -> (TetherMap, DescriptorTable) {
        let mut table = DescriptorTable::new();
        let descriptor = table.register().expect("register");
        let map = TetherMap::bound(BackendHandle::new(Box::new(store), descriptor));
        (map, table)
    }

    #[test]
    fn get_loads_lazily_and_caches() {
        let mut store = MemStore::default();
        store.entries.insert("a".to_string(), "1".to_string());
        let lookups = Rc::clone(&store.lookups);
        let (mut map, _table) = bound_map(store);

        assert_eq!(map.get("a"), "1");
        assert_eq!(map.get("a"), "1");
        // Second read answered from the fresh slot.
        assert_eq!(lookups.get(), 1);
    }

    #[test]
    fn absence_is_cached_without_store_writes() {
        let store = MemStore::default();
        let lookups = Rc::clone(&store.lookups);
        let (mut map, _table) = bound_map(store);

        assert_eq!(map.get("ghost"), "");
        assert_eq!(map.get("ghost"), "");
        // Confirmed-absent after one query; no re-validation.
        assert_eq!(lookups.get(), 1);
    }

    #[test]
    fn set_updates_cache_even_when_store_is_unreachable() {
        let (mut map, _table) = bound_map(DeadStore);
        map.set("k", Some("v"));
        assert_eq!(map.get("k"), "v");
    }

    #[test]
    fn unset_forces_requery() {
        let mut store = MemStore::default();
        store.entries.insert("k".to_string(), "old".to_string());
        let (mut map, _table) = bound_map(store);

        assert_eq!(map.get("k"), "old");
        map.delete("k");
        // Deleted from the store too, so the re-query confirms absence.
        assert_eq!(map.get("k"), "");
    }

    #[test]
    fn materialized_keys_are_entries_without_values() {
        let (mut map, _table) = bound_map(MemStore::default());
        map.materialize("seen");
        assert_eq!(map.slot_count(), 1);
        assert_eq!(map.get("seen"), "");
    }

    #[test]
    fn for_each_walks_store_keys() {
        let mut store = MemStore::default();
        for (k, v) in [("b", "2"), ("a", "1"), ("c", "3")] {
            store.entries.insert(k.to_string(), v.to_string());
        }
        let (mut map, _table) = bound_map(store);

        let mut seen = Vec::new();
        map.for_each(|k, v| seen.push((k.to_string(), v.to_string())))
            .expect("for_each");
        seen.sort();
        assert_eq!(
            seen,
            [
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
                ("c".to_string(), "3".to_string()),
            ]
        );
        // Every visited key now has a slot.
        assert_eq!(map.slot_count(), 3);
    }

    #[test]
    fn replace_all_drains_and_reseeds() {
        let mut store = MemStore::default();
        store.entries.insert("old".to_string(), "x".to_string());
        let (mut map, _table) = bound_map(store);
        map.set("cached", Some("y"));

        let mut next = BTreeMap::new();
        next.insert("x".to_string(), "1".to_string());
        next.insert("y".to_string(), "2".to_string());
        map.replace_all(Some(next));

        // Slots were cleared; contents come back lazily from the store.
        assert_eq!(map.slot_count(), 0);
        assert_eq!(map.get("old"), "");
        assert_eq!(map.get("cached"), "");
        assert_eq!(map.get("x"), "1");
        assert_eq!(map.get("y"), "2");
    }

    #[test]
    fn replace_all_with_none_leaves_store_empty() {
        let mut store = MemStore::default();
        store.entries.insert("a".to_string(), "1".to_string());
        let (mut map, _table) = bound_map(store);

        map.replace_all(None);
        assert_eq!(map.get("a"), "");
        let mut visited = 0;
        map.for_each(|_, _| visited += 1).expect("for_each");
        assert_eq!(visited, 0);
    }

    #[test]
    fn degraded_map_keeps_cached_values() {
        let mut store = MemStore::default();
        store.entries.insert("a".to_string(), "1".to_string());
        let (mut map, mut table) = bound_map(store);

        assert_eq!(map.get("a"), "1");
        map.set("b", Some("2"));
        map.degrade(&mut table);

        assert!(!map.is_bound());
        assert_eq!(table.live_count(), 0);
        assert_eq!(map.get("a"), "1");
        assert_eq!(map.get("b"), "2");
        // Unknown keys are plain misses now; no store to consult.
        assert_eq!(map.get("c"), "");
    }

    #[test]
    fn degraded_replace_is_in_memory_only() {
        let mut map = TetherMap::plain();
        let mut entries = BTreeMap::new();
        entries.insert("k".to_string(), "v".to_string());
        map.replace_all(Some(entries));
        assert_eq!(map.get("k"), "v");

        let mut seen = Vec::new();
        map.for_each(|k, v| seen.push(format!("{k}={v}")))
            .expect("for_each");
        assert_eq!(seen, ["k=v"]);
    }
}
