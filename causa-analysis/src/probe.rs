//! Observation of a single store by the emergence detector.
//!
//! A probe reads the store's current value on demand and counts changes
//! through a subscription. Each counter also remembers the global sequence
//! number of its first change since the last tick, which orders stores by
//! who moved first.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use causa_core::{MemoryCell, SubscriptionId};

use crate::error::Result;

/// Something the detector can sample.
pub trait StoreProbe: Send + Sync {
    /// Current value as JSON, `None` if it cannot be rendered.
    fn sample(&self) -> Option<Value>;

    /// Stops counting changes.
    fn detach(&self);
}

/// Per-store change counter shared with the subscription.
#[derive(Debug, Default)]
pub(crate) struct ChangeCounter {
    changes: AtomicU64,
    /// Sequence number of the first change since the last take; 0 = none.
    first_change: AtomicU64,
}

impl ChangeCounter {
    pub(crate) fn record(&self, sequence: &AtomicU64) {
        self.changes.fetch_add(1, Ordering::SeqCst);
        let seq = sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self
            .first_change
            .compare_exchange(0, seq, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Changes since the last call and the sequence number of the first one.
    pub(crate) fn take(&self) -> (u64, Option<u64>) {
        let changes = self.changes.swap(0, Ordering::SeqCst);
        let first = self.first_change.swap(0, Ordering::SeqCst);
        (changes, (first != 0).then_some(first))
    }
}

/// Probe over a [`MemoryCell`].
pub struct CellProbe<T> {
    cell: MemoryCell<T>,
    subscription: SubscriptionId,
}

impl<T> CellProbe<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    pub(crate) fn attach(
        cell: MemoryCell<T>,
        counter: Arc<ChangeCounter>,
        sequence: Arc<AtomicU64>,
    ) -> Result<Self> {
        let subscription = cell.subscribe(Arc::new(move |_: &T| counter.record(&sequence)))?;
        Ok(Self { cell, subscription })
    }
}

impl<T> StoreProbe for CellProbe<T>
where
    T: Clone + Serialize + Send + Sync + 'static,
{
    fn sample(&self) -> Option<Value> {
        serde_json::to_value(self.cell.get()).ok()
    }

    fn detach(&self) {
        self.cell.unsubscribe(self.subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_tracks_first_change_order() {
        let sequence = Arc::new(AtomicU64::new(0));
        let a = Arc::new(ChangeCounter::default());
        let b = Arc::new(ChangeCounter::default());

        let cell_a = MemoryCell::new(0i64);
        let cell_b = MemoryCell::new(0i64);
        let probe_a = CellProbe::attach(cell_a.clone(), Arc::clone(&a), Arc::clone(&sequence)).unwrap();
        let _probe_b = CellProbe::attach(cell_b.clone(), Arc::clone(&b), Arc::clone(&sequence)).unwrap();

        cell_b.set(1);
        cell_a.set(1);
        cell_b.set(2);

        let (changes_a, first_a) = a.take();
        let (changes_b, first_b) = b.take();
        assert_eq!((changes_a, changes_b), (1, 2));
        assert!(first_b.unwrap() < first_a.unwrap());
        assert_eq!(a.take(), (0, None));

        assert_eq!(probe_a.sample(), Some(serde_json::json!(1)));
        probe_a.detach();
        cell_a.set(5);
        assert_eq!(a.take().0, 0);
    }
}
