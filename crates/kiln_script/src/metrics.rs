//! Boundary-crossing counters
//!
//! With the `metrics` feature disabled the counter compiles to a no-op and
//! every query reports zero.

use crate::calls::InternalCall;

#[cfg(feature = "metrics")]
use std::cell::Cell;

/// Per-call crossing counts.
///
/// Counting goes through `&self` because reads on the port take `&self`.
#[cfg(feature = "metrics")]
#[derive(Debug, Default, Clone)]
pub struct CallCounter {
    counts: [Cell<u64>; InternalCall::COUNT],
}

#[cfg(feature = "metrics")]
impl CallCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: InternalCall) {
        let slot = &self.counts[call.index()];
        slot.set(slot.get() + 1);
    }

    pub fn get(&self, call: InternalCall) -> u64 {
        self.counts[call.index()].get()
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(Cell::get).sum()
    }

    /// Add another counter's totals into this one.
    pub fn merge(&self, other: &CallCounter) {
        for call in InternalCall::ALL {
            let slot = &self.counts[call.index()];
            slot.set(slot.get() + other.get(call));
        }
    }

    pub fn reset(&self) {
        for slot in &self.counts {
            slot.set(0);
        }
    }

    /// Non-zero counts in call order.
    pub fn iter(&self) -> impl Iterator<Item = (InternalCall, u64)> + '_ {
        InternalCall::ALL
            .into_iter()
            .map(|call| (call, self.get(call)))
            .filter(|(_, count)| *count > 0)
    }
}

#[cfg(not(feature = "metrics"))]
#[derive(Debug, Default, Clone)]
pub struct CallCounter;

#[cfg(not(feature = "metrics"))]
impl CallCounter {
    pub fn new() -> Self {
        Self
    }

    pub fn record(&self, _call: InternalCall) {}

    pub fn get(&self, _call: InternalCall) -> u64 {
        0
    }

    pub fn total(&self) -> u64 {
        0
    }

    pub fn merge(&self, _other: &CallCounter) {}

    pub fn reset(&self) {}

    pub fn iter(&self) -> impl Iterator<Item = (InternalCall, u64)> + '_ {
        std::iter::empty()
    }
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn counts_merge_and_reset() {
        let a = CallCounter::new();
        a.record(InternalCall::EntityGetName);
        a.record(InternalCall::EntityGetName);

        let b = CallCounter::new();
        b.record(InternalCall::TransformSetScale);
        a.merge(&b);

        assert_eq!(a.get(InternalCall::EntityGetName), 2);
        assert_eq!(a.total(), 3);
        assert_eq!(
            a.iter().collect::<Vec<_>>(),
            vec![(InternalCall::EntityGetName, 2), (InternalCall::TransformSetScale, 1)]
        );

        a.reset();
        assert_eq!(a.total(), 0);
    }
}

#[cfg(all(test, not(feature = "metrics")))]
mod tests {
    #[test]
    fn test_compiles_without_metrics() {
        let counter = super::CallCounter::new();
        counter.record(crate::calls::InternalCall::EntityGetName);
        assert_eq!(counter.total(), 0);
    }
}

#[cfg(all(test, not(feature = "metrics")))]
mod stub_tests {
    use super::*;

    #[test]
    fn records_nothing() {
        let counter = CallCounter::new();
        counter.record(InternalCall::TransformGetPosition);
        counter.merge(&CallCounter::default());

        assert_eq!(counter.get(InternalCall::TransformGetPosition), 0);
        assert_eq!(counter.total(), 0);
        assert_eq!(counter.iter().count(), 0);
    }
}
