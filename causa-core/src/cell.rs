//! The plain observable cell wrapped by causal stores.
//!
//! A `MemoryCell` is a cheap, cloneable handle to one value plus a bounded
//! set of subscriber slots. Listeners run synchronously after every
//! `set`/`reset`, outside the internal locks, so a listener may read the
//! cell again.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::error::{CausalError, Result};

/// Maximum number of concurrent subscribers per cell.
pub const MAX_SUBSCRIBERS: usize = 64;

/// Callback invoked with the new state.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Slots<T> {
    next_id: u64,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
}

struct Inner<T> {
    initial: T,
    value: RwLock<T>,
    slots: Mutex<Slots<T>>,
}

/// Observable single-writer value cell.
pub struct MemoryCell<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for MemoryCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> MemoryCell<T> {
    /// Creates a cell holding `initial`; `reset` returns to this value.
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Inner {
                value: RwLock::new(initial.clone()),
                initial,
                slots: Mutex::new(Slots {
                    next_id: 0,
                    listeners: Vec::new(),
                }),
            }),
        }
    }

    /// Current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Replaces the value and notifies subscribers.
    pub fn set(&self, value: T) {
        *self.inner.value.write() = value.clone();
        self.notify(&value);
    }

    /// Restores the initial value and notifies subscribers.
    pub fn reset(&self) {
        self.set(self.inner.initial.clone());
    }

    /// Registers a listener.
    ///
    /// # Errors
    /// Returns `CausalError::SubscriberLimit` when all slots are taken.
    pub fn subscribe(&self, listener: Listener<T>) -> Result<SubscriptionId> {
        let mut slots = self.inner.slots.lock();
        if slots.listeners.len() >= MAX_SUBSCRIBERS {
            return Err(CausalError::SubscriberLimit(MAX_SUBSCRIBERS));
        }
        let id = SubscriptionId(slots.next_id);
        slots.next_id += 1;
        slots.listeners.push((id, listener));
        Ok(id)
    }

    /// Removes a listener. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut slots = self.inner.slots.lock();
        let before = slots.listeners.len();
        slots.listeners.retain(|(sid, _)| *sid != id);
        slots.listeners.len() != before
    }

    /// Number of active listeners.
    pub fn subscriber_count(&self) -> usize {
        self.inner.slots.lock().listeners.len()
    }

    fn notify(&self, value: &T) {
        let listeners: Vec<Listener<T>> = self
            .inner
            .slots
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            listener(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for MemoryCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCell")
            .field("value", &*self.inner.value.read())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_set_notifies_and_unsubscribe_stops() {
        let cell = MemoryCell::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = cell
            .subscribe(Arc::new(move |_: &i32| {
                seen.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        cell.set(1);
        cell.set(2);
        assert!(cell.unsubscribe(id));
        cell.set(3);

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cell.get(), 3);
        assert!(!cell.unsubscribe(id));
    }

    #[test]
    fn test_reset_restores_initial() {
        let cell = MemoryCell::new("seed".to_string());
        cell.set("other".to_string());
        cell.reset();
        assert_eq!(cell.get(), "seed");
    }

    #[test]
    fn test_listener_can_read_cell() {
        let cell = MemoryCell::new(0);
        let reader = cell.clone();
        let observed = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&observed);
        cell.subscribe(Arc::new(move |_: &i32| {
            sink.store(reader.get() as usize, Ordering::SeqCst);
        }))
        .unwrap();

        cell.set(7);
        assert_eq!(observed.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_subscriber_limit() {
        let cell = MemoryCell::new(0u8);
        for _ in 0..MAX_SUBSCRIBERS {
            cell.subscribe(Arc::new(|_: &u8| {})).unwrap();
        }
        assert!(matches!(
            cell.subscribe(Arc::new(|_: &u8| {})),
            Err(CausalError::SubscriberLimit(_))
        ));
    }
}
