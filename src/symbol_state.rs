//! Per-symbol aggregate and the ordered per-tick update protocol (spec
//! §3, §4.3).
//!
//! Exclusively owned and mutated by one partition's worker (enforced here
//! by plain Rust ownership: `SymbolState` lives inside the worker's private
//! `HashMap`, never shared). The published [`Statistics`] snapshot is the
//! only piece readers ever see, via [`SymbolState::stats_cell`].

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::anomaly_sink::AnomalySink;
use crate::error::EngineError;
use crate::moving_average::MovingAverageBuffer;
use crate::sliding_window::SlidingWindow;
use crate::spike::{self, Detection};
use crate::types::{Severity, Spike, Statistics, Tick};

/// Converts an `f64` moving-average result to the public `Decimal`
/// representation, falling back to zero in the unreachable case of a
/// non-finite mean (spec boundary conversion, §4.1).
fn f64_to_decimal(v: f64) -> Decimal {
    Decimal::from_f64_retain(v).unwrap_or(Decimal::ZERO)
}

/// The two observable states of a symbol (spec §4.8): `Uninitialized`
/// (absent from the partition map) and `Active` (`update_count >= 1`, the
/// only reachable state once a `SymbolState` exists). There is no type
/// tag for this — `Uninitialized` is simply "no entry in the map yet".
pub(crate) struct SymbolState {
    moving_average: MovingAverageBuffer,
    window: SlidingWindow,
    stats_cell: Arc<ArcSwap<Statistics>>,
}

impl SymbolState {
    pub(crate) fn new(
        symbol: Arc<str>,
        moving_average_window: usize,
        sliding_window_ms: i64,
    ) -> Result<Self, EngineError> {
        Ok(Self {
            moving_average: MovingAverageBuffer::new(moving_average_window)?,
            window: SlidingWindow::new(sliding_window_ms)?,
            stats_cell: Arc::new(ArcSwap::from_pointee(Statistics::seed(symbol))),
        })
    }

    /// The shared, lock-free snapshot cell readers observe (spec §9:
    /// "a published Arc of an immutable Statistics").
    pub(crate) fn stats_cell(&self) -> Arc<ArcSwap<Statistics>> {
        self.stats_cell.clone()
    }

    /// Executes the ordered per-symbol update protocol for one tick (spec
    /// §4.3), returning any spikes detected against the post-update window.
    ///
    /// Steps, in order: (1) push the moving average, (2) add the sample to
    /// the sliding window, (3) compute window extrema, (4) run spike
    /// detection against those extrema, (5) submit any detected spikes to
    /// `anomaly_sink`, (6) publish updated Statistics. Step 6 runs strictly
    /// after step 5 so that a reader who observes the new `Statistics`
    /// snapshot (e.g. the incremented `update_count`) is guaranteed the
    /// spike that produced it is already visible via the sink — "Statistics
    /// update occurs last so that any read-side snapshot published after
    /// the worker yields reflects a fully consistent tick" (spec §4.3).
    /// Because none of these steps can fail for a well-formed `Tick` (no
    /// I/O, no allocation after construction), "all-or-nothing" atomicity
    /// reduces to ordinary sequential execution; the caller additionally
    /// wraps this call in `catch_unwind` (see `partition.rs`) to contain
    /// any unexpected panic per spec §4.5/§4.9.
    pub(crate) fn update(
        &mut self,
        tick: &Tick,
        threshold_ratio: f64,
        anomaly_sink: &AnomalySink,
    ) -> Vec<Spike> {
        let price_f64 = tick.price.to_f64().unwrap_or(0.0);
        let ts_ms = tick.timestamp.timestamp_millis();

        let mean = self.moving_average.push(price_f64);
        self.window.add_sample(ts_ms, price_f64);
        let extrema = self.window.try_get_extrema(ts_ms);

        let detections: Vec<Detection> = match extrema {
            Some((min, max)) => spike::detect(price_f64, min, max, threshold_ratio),
            None => Vec::new(),
        };

        let previous = self.stats_cell.load();
        let min_price = previous.min_price.min(tick.price);
        let max_price = previous.max_price.max(tick.price);
        let update_count = previous.update_count + 1;
        let symbol = previous.symbol.clone();

        let spikes: Vec<Spike> = detections
            .into_iter()
            .map(|d| to_spike(&symbol, d, tick.timestamp))
            .collect();

        // Step 5: submit to the sink before publishing Statistics.
        for spike in &spikes {
            anomaly_sink.record(spike.clone());
        }

        // Step 6: publish last.
        let new_stats = Statistics {
            symbol: symbol.clone(),
            current_price: tick.price,
            moving_average: f64_to_decimal(mean),
            min_price,
            max_price,
            update_count,
            last_update_time: tick.timestamp,
        };
        self.stats_cell.store(Arc::new(new_stats));

        spikes
    }
}

fn to_spike(symbol: &Arc<str>, detection: Detection, detected_at: DateTime<Utc>) -> Spike {
    Spike {
        symbol: symbol.clone(),
        reference_price: f64_to_decimal(detection.reference_price),
        new_price: f64_to_decimal(detection.new_price),
        change_percent: f64_to_decimal(detection.change_percent),
        detected_at,
        severity: detection.severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str, price: Decimal, ts_ms: i64) -> Tick {
        Tick::new(
            symbol,
            price,
            DateTime::<Utc>::from_timestamp_millis(ts_ms).unwrap(),
        )
    }

    #[test]
    fn first_tick_transitions_to_active_with_count_one() {
        let mut state = SymbolState::new(Arc::from("BTCUSD"), 8, 1000).unwrap();
        let sink = AnomalySink::new(100);
        let t = tick("BTCUSD", dec!(100), 0);
        let spikes = state.update(&t, 0.02, &sink);
        assert!(spikes.is_empty());
        let snap = state.stats_cell.load();
        assert_eq!(snap.update_count, 1);
        assert_eq!(snap.current_price, dec!(100));
        assert_eq!(snap.min_price, dec!(100));
        assert_eq!(snap.max_price, dec!(100));
    }

    #[test]
    fn p6_min_max_bracket_current_price_and_count_increments_by_one() {
        let mut state = SymbolState::new(Arc::from("ETHUSD"), 8, 1000).unwrap();
        let sink = AnomalySink::new(100);
        let prices = [dec!(100), dec!(90), dec!(110), dec!(95)];
        for (i, p) in prices.iter().enumerate() {
            let before = state.stats_cell.load().update_count;
            state.update(&tick("ETHUSD", *p, i as i64 * 10), 0.5, &sink);
            let snap = state.stats_cell.load();
            assert_eq!(snap.update_count, before + 1);
            assert!(snap.min_price <= snap.current_price);
            assert!(snap.current_price <= snap.max_price);
        }
        let snap = state.stats_cell.load();
        assert_eq!(snap.min_price, dec!(90));
        assert_eq!(snap.max_price, dec!(110));
    }

    #[test]
    fn s3_detects_upward_spike_end_to_end() {
        let mut state = SymbolState::new(Arc::from("X"), 8, 1000).unwrap();
        let sink = AnomalySink::new(100);
        state.update(&tick("X", dec!(100), 0), 0.02, &sink);
        state.update(&tick("X", dec!(100.5), 100), 0.02, &sink);
        let spikes = state.update(&tick("X", dec!(103), 200), 0.02, &sink);
        assert_eq!(spikes.len(), 1);
        assert_eq!(spikes[0].severity, Severity::Medium);
    }

    #[test]
    fn spike_is_recorded_in_sink_before_statistics_publish_returns() {
        // spec §4.3: step 5 (sink submission) happens before step 6
        // (Statistics publish). Exercise this directly: by the time
        // `update` returns the spike it detected, the sink must already
        // contain it (the sink itself has no ordering relative to the
        // stats cell from the caller's point of view, but both steps have
        // already executed by the time control returns here).
        let mut state = SymbolState::new(Arc::from("SPK"), 8, 1000).unwrap();
        let sink = AnomalySink::new(100);
        state.update(&tick("SPK", dec!(100), 0), 0.02, &sink);
        state.update(&tick("SPK", dec!(100.5), 100), 0.02, &sink);
        let spikes = state.update(&tick("SPK", dec!(103), 200), 0.02, &sink);
        assert_eq!(spikes.len(), 1);
        assert_eq!(sink.count(Some("SPK")), 1);
    }
}
