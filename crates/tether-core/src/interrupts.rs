//! # Deferred-Interrupt Critical Sections
//!
//! Multi-step store mutations (unbind, bulk drain/reseed) must not be
//! observed half-finished by an asynchronous interrupt handler that might
//! itself touch the same store. While any [`CriticalSection`] guard is
//! alive, interrupt notifications are recorded but not observable; they
//! become visible once the last guard drops. Deferred, never dropped.
//!
//! Interrupt state is process-global, like the signals it models. All
//! operations are atomic so [`notify`] may be called from a signal handler.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

static DEPTH: AtomicU32 = AtomicU32::new(0);
static PENDING: AtomicBool = AtomicBool::new(false);

/// Record an asynchronous interrupt. Async-signal-safe.
pub fn notify() {
    PENDING.store(true, Ordering::SeqCst);
}

/// True when an interrupt has been recorded and no critical section is
/// active.
#[must_use]
pub fn pending() -> bool {
    DEPTH.load(Ordering::SeqCst) == 0 && PENDING.load(Ordering::SeqCst)
}

/// Consume a pending interrupt if one is observable right now.
#[must_use]
pub fn take_pending() -> bool {
    if DEPTH.load(Ordering::SeqCst) != 0 {
        return false;
    }
    PENDING.swap(false, Ordering::SeqCst)
}

/// RAII guard deferring interrupt observation for its lifetime.
///
/// Nestable; the section ends when the outermost guard drops, on every
/// exit path including early returns.
#[derive(Debug)]
pub struct CriticalSection {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl CriticalSection {
    /// Enter a critical section.
    #[must_use = "the critical section ends when the guard is dropped"]
    pub fn enter() -> Self {
        DEPTH.fetch_add(1, Ordering::SeqCst);
        Self {
            _not_send: std::marker::PhantomData,
        }
    }
}

impl Drop for CriticalSection {
    fn drop(&mut self) {
        DEPTH.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // Single test: the pending flag is process-global, so splitting these
    // assertions across tests would let the harness interleave them.
    #[test]
    fn interrupts_are_deferred_not_dropped() {
        let outer = CriticalSection::enter();
        let inner = CriticalSection::enter();
        notify();
        assert!(!pending());
        assert!(!take_pending());

        drop(inner);
        // Still inside the outer section.
        assert!(!pending());

        drop(outer);
        // Other tests may hold their own sections at this instant; the
        // notification stays recorded until it becomes observable.
        loop {
            if take_pending() {
                break;
            }
            std::thread::yield_now();
        }
        assert!(!pending());
    }
}
