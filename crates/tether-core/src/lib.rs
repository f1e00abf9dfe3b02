//! # tether-core
//!
//! A transparent caching bridge between a persistent key-value store and a
//! live mutable associative container.
//!
//! Every read and write to an in-memory mapping is lazily and synchronously
//! mirrored to an on-disk database, with the mapping acting as a
//! write-through cache over the store:
//!
//! - reads lazily fill per-key [`Slot`]s from the store, caching values and
//!   confirmed absences alike;
//! - writes update the slot first, then mirror to the store best-effort;
//! - unbinding degrades the mapping in place to an ordinary container.
//!
//! ## Architectural Constraints
//!
//! - Single-threaded, cooperative: store I/O is synchronous and blocking.
//! - No caching policy beyond "trust the cache once populated": the store
//!   engine enforces single-writer/multi-reader exclusivity, so a fresh
//!   slot stays valid for the life of the binding.
//! - No concurrent writers, no multi-key transactions.
//! - The store engine is opaque behind [`KvStore`]; new engines register in
//!   [`registry`] rather than at call sites.

// =============================================================================
// MODULES
// =============================================================================

pub mod handle;
pub mod host;
pub mod interrupts;
pub mod mapping;
pub mod registry;
pub mod slot;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS
// =============================================================================

pub use handle::{BackendHandle, Descriptor, DescriptorTable};
pub use host::{Binding, Namespace, UnbindOutcome, Variable};
pub use interrupts::CriticalSection;
pub use mapping::TetherMap;
pub use registry::{OpenFn, REDB_BACKEND, backend_names, open_backend};
pub use slot::{Freshness, Slot};
pub use store::{KvStore, RedbStore};
pub use types::{AccessMode, TetherError};
