//! Engine configuration (spec §6).
//!
//! This is the plain value type the engine's constructor accepts — not the
//! env/file loading layer, which is deliberately out of scope (spec §1).
//! Mirrors the shape of the teacher's `AppConfig`, minus the `dotenv`/env
//! parsing that belongs to the excluded outer layer.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::EngineError;

/// Default channel capacity per partition (spec §6 table).
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100_000;
/// Default moving-average window (spec §6 table).
pub const DEFAULT_MOVING_AVERAGE_WINDOW: usize = 64;
/// Default sliding-window width in milliseconds (spec §6 table).
pub const DEFAULT_SLIDING_WINDOW_MILLISECONDS: i64 = 1_000;
/// Default anomaly threshold, in percent (spec §6 table).
pub const DEFAULT_ANOMALY_THRESHOLD_PERCENT: f64 = 2.0;
/// Default anomaly-sink retention capacity (spec §6 table).
pub const DEFAULT_RECENT_ANOMALIES_CAPACITY: usize = 10_000;
/// Minimum enforced anomaly-sink capacity (spec §4.7).
pub const MIN_RECENT_ANOMALIES_CAPACITY: usize = 100;

/// Validated configuration for an [`crate::Engine`].
///
/// Construct with [`EngineConfig::new`] or start from [`EngineConfig::
/// default`] and override individual fields; either way, [`EngineConfig::
/// validate`] runs (implicitly, via `Engine::new`) before the engine can
/// start.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Number of partitions/workers. `0` means "available parallelism"
    /// (spec §6); resolved eagerly in [`EngineConfig::resolved_partitions`].
    pub partitions: usize,
    /// Bounded capacity of each partition's ingress queue.
    pub channel_capacity: usize,
    /// Capacity `W` of the per-symbol moving-average ring buffer.
    pub moving_average_window: usize,
    /// Width of the spike-detection sliding window, in milliseconds.
    pub sliding_window_milliseconds: i64,
    /// Spike threshold, expressed in percent (divided by 100 before use).
    pub anomaly_threshold_percent: Decimal,
    /// Capacity `K` of the anomaly sink (clamped up to at least 100).
    pub recent_anomalies_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            partitions: 0,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            moving_average_window: DEFAULT_MOVING_AVERAGE_WINDOW,
            sliding_window_milliseconds: DEFAULT_SLIDING_WINDOW_MILLISECONDS,
            anomaly_threshold_percent: Decimal::try_from(DEFAULT_ANOMALY_THRESHOLD_PERCENT)
                .expect("2.0 fits in Decimal"),
            recent_anomalies_capacity: DEFAULT_RECENT_ANOMALIES_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Number of partitions after resolving the `0` = "available
    /// parallelism" sentinel (spec §6).
    pub fn resolved_partitions(&self) -> usize {
        if self.partitions == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.partitions
        }
    }

    /// Threshold as a fractional ratio (e.g. `2.0%` -> `0.02`), as used by
    /// the spike detector (spec §4.4).
    pub fn threshold_ratio(&self) -> f64 {
        self.anomaly_threshold_percent.to_f64().unwrap_or(0.0) / 100.0
    }

    /// Validates every constraint from the spec §6 table, fast-failing with
    /// a descriptive [`EngineError::InvalidConfig`].
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.channel_capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "channel_capacity must be > 0".into(),
            ));
        }
        if self.moving_average_window == 0 {
            return Err(EngineError::InvalidConfig(
                "moving_average_window must be > 0".into(),
            ));
        }
        if self.sliding_window_milliseconds <= 0 {
            return Err(EngineError::InvalidConfig(
                "sliding_window_milliseconds must be > 0".into(),
            ));
        }
        if self.anomaly_threshold_percent <= Decimal::ZERO {
            return Err(EngineError::InvalidConfig(
                "anomaly_threshold_percent must be > 0".into(),
            ));
        }
        // recent_anomalies_capacity has no failure mode: values below the
        // spec-mandated floor are clamped up by `AnomalySink::new`, matching
        // "minimum enforced lower bound of 100" rather than rejecting the
        // configuration outright.
        Ok(())
    }

    /// Clamped anomaly-sink capacity (spec §4.7: "minimum enforced lower
    /// bound of 100").
    pub fn effective_anomaly_capacity(&self) -> usize {
        self.recent_anomalies_capacity
            .max(MIN_RECENT_ANOMALIES_CAPACITY)
    }
}
