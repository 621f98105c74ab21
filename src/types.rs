//! Public data model (spec §3): `Tick`, `Statistics`, `Spike`, and the
//! read-side `Metrics` snapshot.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Maximum symbol length in graphemes, per spec §3 ("≤ 10 graphemes"). We
/// check byte length of the normalized-uppercase-ASCII form, which is
/// sufficient for the short instrument identifiers this engine targets.
pub const MAX_SYMBOL_LEN: usize = 10;

/// One observed price sample for one symbol at one instant.
///
/// Constructed once at ingress; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: impl Into<String>, price: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp,
        }
    }
}

/// Per-symbol mutable aggregate, as observed by a reader at some instant.
///
/// Every instance returned by the engine's read paths is an owned snapshot;
/// it never aliases live worker state (spec §3, §5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub symbol: Arc<str>,
    pub current_price: Decimal,
    pub moving_average: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub update_count: u64,
    pub last_update_time: DateTime<Utc>,
}

impl Statistics {
    /// The sentinel record for a symbol that has not yet processed a tick.
    /// Never published to readers (spec §3: `min_price`/`max_price` start at
    /// +/-infinity sentinels); kept here only as the seed for a new
    /// `SymbolState`.
    pub(crate) fn seed(symbol: Arc<str>) -> Self {
        Self {
            symbol,
            current_price: Decimal::ZERO,
            moving_average: Decimal::ZERO,
            min_price: Decimal::MAX,
            max_price: Decimal::MIN,
            update_count: 0,
            last_update_time: DateTime::<Utc>::from_timestamp(0, 0).expect("epoch is valid"),
        }
    }
}

/// Severity bucket for a detected [`Spike`], classified by `|change_percent|`
/// (spec §3): `Medium` ≤ 3, `High` ≤ 5, else `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn classify(change_percent_abs: f64) -> Self {
        if change_percent_abs <= 3.0 {
            Severity::Medium
        } else if change_percent_abs <= 5.0 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// A detected short-horizon price spike (spec §3, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spike {
    pub symbol: Arc<str>,
    pub reference_price: Decimal,
    pub new_price: Decimal,
    pub change_percent: Decimal,
    pub detected_at: DateTime<Utc>,
    pub severity: Severity,
}

/// Snapshot of engine-wide counters and gauges (spec §4.6, §6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_processed: u64,
    pub spikes_detected: u64,
    pub active_symbols: usize,
    pub total_queue_depth: usize,
    pub dropped_ticks: u64,
    pub processing_errors: u64,
}
