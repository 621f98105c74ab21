//! Bounded, recency-ordered retention of detected spikes, shared across all
//! partition workers and all readers (spec §4.7).
//!
//! Backed by a `parking_lot::Mutex<VecDeque<Spike>>` — multiple writers
//! (one per worker) and many concurrent readers, satisfying spec §4.7's
//! "no torn read" and "record does not block recent for longer than O(k)"
//! requirements via a single brief critical section per call. `parking_lot`
//! is already present in this pack for exactly this kind of short-lived
//! guard (`sliding_stat.rs`'s `SyncSlidingStats`).

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::config::MIN_RECENT_ANOMALIES_CAPACITY;
use crate::types::Spike;

pub struct AnomalySink {
    inner: Mutex<VecDeque<Spike>>,
    capacity: usize,
}

impl AnomalySink {
    /// Creates a sink retaining at most `capacity` spikes, clamped up to
    /// the spec-mandated floor of 100 (spec §4.7).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_RECENT_ANOMALIES_CAPACITY);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends a spike, evicting from the front until size is back within
    /// capacity.
    pub fn record(&self, spike: Spike) {
        let mut guard = self.inner.lock();
        guard.push_back(spike);
        while guard.len() > self.capacity {
            guard.pop_front();
        }
    }

    /// Returns up to `take` spikes, newest first, optionally restricted to
    /// `symbol_filter`. `take` is clamped to `max(1, take)`.
    pub fn recent(&self, take: usize, symbol_filter: Option<&str>) -> Vec<Spike> {
        let take = take.max(1);
        let guard = self.inner.lock();
        guard
            .iter()
            .rev()
            .filter(|s| symbol_filter.is_none_or(|f| &*s.symbol == f))
            .take(take)
            .cloned()
            .collect()
    }

    /// Total retained count, optionally restricted to `symbol_filter`.
    pub fn count(&self, symbol_filter: Option<&str>) -> usize {
        let guard = self.inner.lock();
        match symbol_filter {
            None => guard.len(),
            Some(f) => guard.iter().filter(|s| &*s.symbol == f).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::sync::Arc as StdArc;

    fn spike(symbol: &str, change_percent: rust_decimal::Decimal) -> Spike {
        Spike {
            symbol: StdArc::from(symbol),
            reference_price: dec!(100),
            new_price: dec!(103),
            change_percent,
            detected_at: Utc::now(),
            severity: crate::types::Severity::Medium,
        }
    }

    #[test]
    fn capacity_is_clamped_up_to_floor() {
        let sink = AnomalySink::new(1);
        assert_eq!(sink.capacity, MIN_RECENT_ANOMALIES_CAPACITY);
    }

    #[test]
    fn p8_recency_and_capacity_eviction() {
        let sink = AnomalySink::new(100);
        for i in 0..150 {
            sink.record(spike("X", rust_decimal::Decimal::from(i)));
        }
        assert_eq!(sink.count(None), 100);
        let newest = sink.recent(1, None);
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].change_percent, rust_decimal::Decimal::from(149));

        let five = sink.recent(5, None);
        let expected: Vec<i64> = (145..150).rev().collect();
        let got: Vec<i64> = five
            .iter()
            .map(|s| s.change_percent.to_string().parse().unwrap())
            .collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn filters_by_symbol() {
        let sink = AnomalySink::new(100);
        sink.record(spike("A", dec!(1)));
        sink.record(spike("B", dec!(2)));
        sink.record(spike("A", dec!(3)));
        assert_eq!(sink.count(Some("A")), 2);
        assert_eq!(sink.count(Some("B")), 1);
        assert_eq!(sink.recent(10, Some("A")).len(), 2);
    }

    #[test]
    fn take_is_clamped_to_at_least_one() {
        let sink = AnomalySink::new(100);
        sink.record(spike("A", dec!(1)));
        assert_eq!(sink.recent(0, None).len(), 1);
    }
}
