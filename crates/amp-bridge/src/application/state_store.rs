//! StateStore: the cached hardware view plus the single busy gate.
//!
//! Two pieces of shared state live here:
//!
//! - The [`HardwareState`] cache, read by status queries and written after a
//!   successful mutating helper call.
//! - The busy flag, which admits at most one mutating helper call system-wide.
//!
//! # Busy gate
//!
//! [`StateStore::try_acquire`] is a single compare-and-swap: two actions that
//! arrive together can never both observe "not busy".  A successful acquire
//! returns a [`BusyGuard`]; dropping the guard clears the flag.  Because the
//! release lives in `Drop`, it runs exactly once on every exit path of the
//! action task: normal completion, helper failure, timeout, or a panic that
//! unwinds through the task.
//!
//! ```text
//! try_acquire() ── Some(guard) ──► helper call ──► drop(guard) ──► not busy
//!       │
//!       └──────── None ──────────► "busy" Completion, nothing else happens
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::state::{Attribute, AttributeError, HardwareState};

/// Owned store for the cached hardware state and the busy flag.
///
/// Share it between the router and its action tasks with an `Arc`.  Each
/// bridge instance owns its own store, so tests can run many side by side.
#[derive(Debug, Default)]
pub struct StateStore {
    state: Mutex<HardwareState>,
    busy: Arc<AtomicBool>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose cache starts from `state`.
    pub fn with_state(state: HardwareState) -> Self {
        Self {
            state: Mutex::new(state),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the cached value of the attribute named `attribute`.
    ///
    /// # Errors
    ///
    /// Returns [`AttributeError::UnknownAttribute`] when the name is not one
    /// of the cached attributes.
    pub fn get(&self, attribute: &str) -> Result<bool, AttributeError> {
        let attribute: Attribute = attribute.parse()?;
        Ok(self.value(attribute))
    }

    /// Returns the cached value of a known attribute.
    pub fn value(&self, attribute: Attribute) -> bool {
        self.lock_state().get(attribute)
    }

    /// Overwrites the cached value.  Idempotent.
    pub fn set(&self, attribute: Attribute, value: bool) {
        self.lock_state().set(attribute, value);
    }

    /// Copy of the whole cache.
    pub fn snapshot(&self) -> HardwareState {
        self.lock_state().clone()
    }

    /// Claims the busy gate.
    ///
    /// Returns `None` when another mutating call already holds it.  Never
    /// waits and never queues.
    pub fn try_acquire(&self) -> Option<BusyGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard {
                busy: Arc::clone(&self.busy),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    // A panic while holding the lock cannot leave a HardwareState half
    // written (every write is a single insert), so a poisoned lock is safe to
    // keep using.
    fn lock_state(&self) -> MutexGuard<'_, HardwareState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Proof of holding the busy gate.  Dropping it releases the gate.
#[derive(Debug)]
#[must_use = "dropping the guard immediately releases the busy gate"]
pub struct BusyGuard {
    busy: Arc<AtomicBool>,
}

impl BusyGuard {
    /// Releases the gate now.  Equivalent to dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}
