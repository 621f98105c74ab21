//! Real-time tick ingestion, rolling statistics, and spike detection.
//!
//! The public surface is [`Engine`]: construct one from an [`EngineConfig`],
//! `start` it, feed it [`Tick`]s with [`Engine::enqueue`], and read back
//! [`Statistics`], [`Spike`]s, and [`Metrics`] at any time from any thread.

mod anomaly_sink;
mod config;
mod engine;
mod error;
mod metrics;
mod moving_average;
mod partition;
mod queue;
mod router;
mod sliding_window;
mod spike;
mod symbol_state;
mod types;
mod util;

pub use config::{
    EngineConfig, DEFAULT_ANOMALY_THRESHOLD_PERCENT, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_MOVING_AVERAGE_WINDOW, DEFAULT_RECENT_ANOMALIES_CAPACITY,
    DEFAULT_SLIDING_WINDOW_MILLISECONDS, MIN_RECENT_ANOMALIES_CAPACITY,
};
pub use engine::Engine;
pub use error::EngineError;
pub use types::{Metrics, Severity, Spike, Statistics, Tick, MAX_SYMBOL_LEN};
