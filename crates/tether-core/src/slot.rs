//! # Entry Cache Slots
//!
//! One slot per observed key. A slot caches either a value or a confirmed
//! absence, plus a freshness flag saying whether that cached state may be
//! trusted without consulting the store.
//!
//! Slots are never destroyed individually; their lifetime is the owning
//! mapping's.

// =============================================================================
// FRESHNESS
// =============================================================================

/// Whether a slot's cached state is trusted without re-querying the store.
///
/// The store backend enforces single-writer-or-multiple-readers exclusivity,
/// so once a slot is fresh under the current binding no other process can
/// have concurrently changed the key. Fresh state therefore stays valid for
/// the life of the binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Cached value (or cached absence) is authoritative.
    Fresh,
    /// Observed but not loaded, or explicitly unset; the store must be
    /// consulted before the cached state is trusted.
    #[default]
    Stale,
}

// =============================================================================
// SLOT
// =============================================================================

/// The in-memory cached representation of one key.
#[derive(Debug, Clone, Default)]
pub struct Slot {
    value: Option<String>,
    freshness: Freshness,
}

impl Slot {
    /// A newly materialized slot: observed, not yet loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the cached state may be used without a store query.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.freshness == Freshness::Fresh
    }

    /// The cached value, regardless of freshness.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Cache a value and mark the slot fresh. Any previously cached value
    /// is released.
    pub fn fill(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
        self.freshness = Freshness::Fresh;
    }

    /// Record a confirmed absence: no value, but trusted, so the store is
    /// not re-queried for a key known not to exist.
    pub fn confirm_absent(&mut self) {
        self.value = None;
        self.freshness = Freshness::Fresh;
    }

    /// Explicit unset: clear the cached value and force the next read to
    /// re-query the store, matching deletion semantics.
    pub fn clear(&mut self) {
        self.value = None;
        self.freshness = Freshness::Stale;
    }
}

// =============================================================================
// TESTS
// =============================================================================
