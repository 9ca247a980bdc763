//! Per-key async locks for collapsing concurrent cache misses.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock for one key plus the number of callers holding or waiting on it.
#[derive(Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

type Slots = Mutex<HashMap<String, Slot>>;

/// Registry of in-flight keys.
///
/// A slot exists only while some caller holds or waits on it; distinct keys
/// never contend.
#[derive(Default)]
pub(crate) struct Flights {
    slots: Arc<Slots>,
}

impl Flights {
    /// Wait for exclusive access to `key`.
    ///
    /// The caller is registered before waiting, so dropping this future
    /// early still releases its claim on the slot.
    pub(crate) async fn enter(&self, key: &str) -> Flight {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        let mut flight = Flight { slots: Arc::clone(&self.slots), key: key.to_string(), guard: None };
        flight.guard = Some(lock.lock_owned().await);
        flight
    }

    /// Number of keys with a live slot.
    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Claim on one key; exclusive once entered, released on drop.
pub(crate) struct Flight {
    slots: Arc<Slots>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Flight {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}
