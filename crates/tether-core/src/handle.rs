//! # Backend Handle and Descriptor Table
//!
//! A [`BackendHandle`] owns the open store connection for one bound mapping
//! together with the descriptor the host issued for it. Closing the handle
//! drops the connection and deregisters the descriptor as one step, so the
//! host's accounting can never name a dead connection.
//!
//! The [`DescriptorTable`] models the host's table of live I/O resources.
//! It is bounded: registration fails when every slot is taken, and a caller
//! that has already opened a store must close it before surfacing that
//! failure.

use crate::store::KvStore;
use crate::types::TetherError;
use std::collections::BTreeSet;

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// Identifier of one registered store connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Descriptor(u64);

/// Host-side accounting of open store connections.
#[derive(Debug)]
pub struct DescriptorTable {
    live: BTreeSet<u64>,
    next: u64,
    capacity: usize,
}

impl DescriptorTable {
    /// Default table size.
    pub const DEFAULT_CAPACITY: usize = 1024;

    /// Table with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Table with an explicit capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: BTreeSet::new(),
            next: 0,
            capacity,
        }
    }

    /// Register a new connection, returning its descriptor.
    pub fn register(&mut self) -> Result<Descriptor, TetherError> {
        if self.live.len() >= self.capacity {
            return Err(TetherError::DescriptorExhausted);
        }
        let id = self.next;
        self.next = self.next.saturating_add(1);
        self.live.insert(id);
        Ok(Descriptor(id))
    }

    /// Remove a descriptor from the table.
    pub fn deregister(&mut self, descriptor: Descriptor) {
        self.live.remove(&descriptor.0);
    }

    /// Number of live descriptors.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Is `descriptor` currently registered?
    #[must_use]
    pub fn is_registered(&self, descriptor: Descriptor) -> bool {
        self.live.contains(&descriptor.0)
    }
}

impl Default for DescriptorTable {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// BACKEND HANDLE
// =============================================================================

/// Owns the open store connection of one bound mapping.
///
/// At most one handle exists per binding; the mapping's slots reach the
/// store only through it, so once the mapping drops the handle no slot can
/// touch a dead connection.
pub struct BackendHandle {
    store: Box<dyn KvStore>,
    descriptor: Descriptor,
}

impl std::fmt::Debug for BackendHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendHandle")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

impl BackendHandle {
    /// Wrap an open store connection and its registered descriptor.
    #[must_use]
    pub fn new(store: Box<dyn KvStore>, descriptor: Descriptor) -> Self {
        Self { store, descriptor }
    }

    /// Read access to the store.
    #[must_use]
    pub fn store(&self) -> &dyn KvStore {
        self.store.as_ref()
    }

    /// Write access to the store.
    pub fn store_mut(&mut self) -> &mut dyn KvStore {
        self.store.as_mut()
    }

    /// The descriptor registered for this connection.
    #[must_use]
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Close the connection and deregister its descriptor together.
    pub fn close(self, table: &mut DescriptorTable) {
        table.deregister(self.descriptor);
        drop(self.store);
    }
}

// =============================================================================
// TESTS
// =============================================================================
