//! Error taxonomy for the engine boundary (spec §7).
//!
//! Per-tick processing failures never reach here — they are absorbed by the
//! partition worker and surfaced only through [`crate::Metrics::processing_errors`].

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced synchronously to a caller of the public [`crate::Engine`] API.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A malformed `Tick` was rejected at ingress (empty/over-length symbol,
    /// non-positive price).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An `EngineConfig` value violated one of the constraints in spec §6.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Enqueue or a mutating lifecycle call was attempted while the engine
    /// is not in the `Running` state.
    #[error("engine is not running")]
    NotRunning,

    /// `start` was called more than once.
    #[error("engine is already running")]
    AlreadyRunning,

    /// `stop` did not observe all workers finish within the bounded timeout;
    /// remaining state was discarded anyway.
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),
}
