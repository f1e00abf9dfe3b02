//! # Lifecycle Controller
//!
//! [`Namespace`] is the host-side table of named variables. A variable is
//! either a plain associative container or a tethered mapping; `bind` and
//! `unbind` move names between those states while keeping the descriptor
//! accounting exact: every successful bind registers exactly one
//! descriptor, every unbind (or failed bind after open) releases exactly
//! one.

use crate::handle::{BackendHandle, DescriptorTable};
use crate::interrupts::CriticalSection;
use crate::mapping::TetherMap;
use crate::registry;
use crate::types::{AccessMode, TetherError};
use std::collections::BTreeMap;
use std::path::Path;

// =============================================================================
// VARIABLES
// =============================================================================

/// One bound mapping plus its host-level flags.
#[derive(Debug)]
pub struct Binding {
    map: TetherMap,
    read_only: bool,
}

impl Binding {
    /// The mapping behind this binding.
    #[must_use]
    pub fn map(&self) -> &TetherMap {
        &self.map
    }

    /// Is the binding protected against writes and removal?
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }
}

/// A variable visible in the host namespace.
#[derive(Debug)]
pub enum Variable {
    /// An ordinary associative container.
    Plain(BTreeMap<String, String>),
    /// A mapping tethered to a store.
    Tethered(Binding),
}

impl Variable {
    /// Human-readable kind, for listings.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Plain(_) => "plain",
            Self::Tethered(_) => "tethered",
        }
    }
}

// =============================================================================
// UNBIND OUTCOME
// =============================================================================

/// Result of a batch unbind. Every requested name is processed in input
/// order; failures accumulate instead of aborting the batch.
#[derive(Debug, Default)]
pub struct UnbindOutcome {
    failures: Vec<(String, TetherError)>,
}

impl UnbindOutcome {
    /// True when every name was unbound.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// The names that failed, with their errors, in input order.
    #[must_use]
    pub fn failures(&self) -> &[(String, TetherError)] {
        &self.failures
    }

    /// Consume the outcome, yielding the failures.
    #[must_use]
    pub fn into_failures(self) -> Vec<(String, TetherError)> {
        self.failures
    }
}

// =============================================================================
// NAMESPACE
// =============================================================================

/// The host namespace: named variables plus the descriptor table.
#[derive(Debug, Default)]
pub struct Namespace {
    variables: BTreeMap<String, Variable>,
    descriptors: DescriptorTable,
}

impl Namespace {
    /// An empty namespace.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to the store at `path` via the `backend` engine.
    ///
    /// Any existing variable under `name` is removed first; a refused
    /// removal (read-only binding) aborts the bind before any store I/O, so
    /// no connection is ever orphaned by a failed replacement. Then the
    /// store is opened through the registry and its descriptor registered;
    /// if registration fails the connection is closed before returning.
    pub fn bind(
        &mut self,
        backend: &str,
        path: &Path,
        mode: AccessMode,
        name: &str,
    ) -> Result<(), TetherError> {
        if self.variables.contains_key(name) {
            self.remove(name)?;
        }

        let store = registry::open_backend(backend, path, mode)?;
        let descriptor = match self.descriptors.register() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                // Nothing registered yet; dropping the connection leaves no
                // trace.
                drop(store);
                return Err(e);
            }
        };

        let map = TetherMap::bound(BackendHandle::new(store, descriptor));
        self.variables.insert(
            name.to_string(),
            Variable::Tethered(Binding {
                map,
                read_only: mode.is_read_only(),
            }),
        );
        Ok(())
    }

    /// Unbind each name in `names`, in order.
    ///
    /// Missing names and plain variables are recorded as failures and the
    /// batch keeps going. `unprotect` clears a binding's read-only flag
    /// before removal; without it a read-only binding fails. Each removal
    /// runs inside a critical section: degrade the mapping (close handle,
    /// deregister descriptor), then drop the variable from the namespace.
    pub fn unbind(&mut self, names: &[&str], unprotect: bool) -> UnbindOutcome {
        let mut outcome = UnbindOutcome::default();
        for &name in names {
            match self.variables.get_mut(name) {
                None => {
                    outcome
                        .failures
                        .push((name.to_string(), TetherError::UnbindTarget(name.to_string())));
                }
                Some(Variable::Plain(_)) => {
                    outcome
                        .failures
                        .push((name.to_string(), TetherError::NotTethered(name.to_string())));
                }
                Some(Variable::Tethered(binding)) => {
                    let _guard = CriticalSection::enter();
                    if unprotect {
                        binding.read_only = false;
                    }
                    if binding.read_only {
                        outcome
                            .failures
                            .push((name.to_string(), TetherError::ReadOnly(name.to_string())));
                        continue;
                    }
                    binding.map.degrade(&mut self.descriptors);
                    self.variables.remove(name);
                }
            }
        }
        outcome
    }

    /// Remove a variable entirely.
    ///
    /// Tethered mappings are degraded first (handle closed and nulled) so
    /// slot teardown during the drop can never reach a dead connection.
    /// Read-only bindings refuse removal.
    pub fn remove(&mut self, name: &str) -> Result<(), TetherError> {
        match self.variables.get_mut(name) {
            None => Err(TetherError::NoSuchVariable(name.to_string())),
            Some(Variable::Tethered(binding)) if binding.read_only => {
                Err(TetherError::ReadOnly(name.to_string()))
            }
            Some(Variable::Tethered(binding)) => {
                binding.map.degrade(&mut self.descriptors);
                self.variables.remove(name);
                Ok(())
            }
            Some(Variable::Plain(_)) => {
                self.variables.remove(name);
                Ok(())
            }
        }
    }

    /// Read one key through a variable. Unknown keys read as empty.
    pub fn get(&mut self, name: &str, key: &str) -> Result<String, TetherError> {
        match self.variables.get_mut(name) {
            None => Err(TetherError::NoSuchVariable(name.to_string())),
            Some(Variable::Plain(map)) => Ok(map.get(key).cloned().unwrap_or_default()),
            Some(Variable::Tethered(binding)) => Ok(binding.map.get(key)),
        }
    }

    /// Write (`Some`) or unset (`None`) one key through a variable.
    ///
    /// Assigning through an unknown name creates a plain variable, the way
    /// a shell assignment would. Read-only bindings refuse writes.
    pub fn set(
        &mut self,
        name: &str,
        key: &str,
        value: Option<&str>,
    ) -> Result<(), TetherError> {
        match self.variables.get_mut(name) {
            None => {
                let mut map = BTreeMap::new();
                if let Some(v) = value {
                    map.insert(key.to_string(), v.to_string());
                }
                self.variables.insert(name.to_string(), Variable::Plain(map));
                Ok(())
            }
            Some(Variable::Plain(map)) => {
                match value {
                    Some(v) => {
                        map.insert(key.to_string(), v.to_string());
                    }
                    None => {
                        map.remove(key);
                    }
                }
                Ok(())
            }
            Some(Variable::Tethered(binding)) => {
                if binding.read_only {
                    return Err(TetherError::ReadOnly(name.to_string()));
                }
                binding.map.set(key, value);
                Ok(())
            }
        }
    }

    /// Visit every key/value of a variable.
    pub fn enumerate(
        &mut self,
        name: &str,
        mut visit: impl FnMut(&str, &str),
    ) -> Result<(), TetherError> {
        match self.variables.get_mut(name) {
            None => Err(TetherError::NoSuchVariable(name.to_string())),
            Some(Variable::Plain(map)) => {
                for (key, value) in map.iter() {
                    visit(key, value);
                }
                Ok(())
            }
            Some(Variable::Tethered(binding)) => binding.map.for_each(visit),
        }
    }

    /// Replace a variable's entire contents.
    ///
    /// On a tethered mapping this triggers the bulk replace protocol
    /// (drain, compact, reseed). On a plain variable or an unknown name it
    /// is an ordinary assignment.
    pub fn replace(
        &mut self,
        name: &str,
        entries: BTreeMap<String, String>,
    ) -> Result<(), TetherError> {
        match self.variables.get_mut(name) {
            None => {
                self.variables
                    .insert(name.to_string(), Variable::Plain(entries));
                Ok(())
            }
            Some(Variable::Plain(map)) => {
                *map = entries;
                Ok(())
            }
            Some(Variable::Tethered(binding)) => {
                if binding.read_only {
                    return Err(TetherError::ReadOnly(name.to_string()));
                }
                binding.map.replace_all(Some(entries));
                Ok(())
            }
        }
    }

    /// Does a variable exist under `name`?
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    /// Look up a variable.
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    /// All variables, in name order.
    pub fn variables(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.variables.iter().map(|(name, var)| (name.as_str(), var))
    }

    /// Number of store descriptors currently registered.
    #[must_use]
    pub fn live_descriptors(&self) -> usize {
        self.descriptors.live_count()
    }
}

// =============================================================================
// TESTS
// =============================================================================
