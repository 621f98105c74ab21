//! The top-level engine: routing, lifecycle, and read paths (spec §4.6,
//! §4.8, §6).

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::anomaly_sink::AnomalySink;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::metrics::Counters;
use crate::partition::PartitionHandle;
use crate::router::partition_index;
use crate::types::{Metrics, Spike, Statistics, Tick, MAX_SYMBOL_LEN};

/// Bound on how long `stop` waits for workers to drain before giving up
/// and discarding remaining state (spec §4.5, §5: "bounded timeout").
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

const CONSTRUCTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPING: u8 = 2;
const STOPPED: u8 = 3;

/// The real-time tick processing engine (spec §2, §6).
///
/// `Engine` is cheaply clonable-by-reference in spirit (callers typically
/// hold it behind an `Arc<Engine>`), but unlike the teacher's split
/// reader/writer handles, every method is available on the one value —
/// `enqueue` from producers, the read paths from anyone — since all of
/// the engine's genuinely shared state is already behind its own interior
/// synchronization (spec §9: "a single `Engine` value whose read handles
/// are cheaply clonable").
pub struct Engine {
    config: Arc<EngineConfig>,
    partitions: Vec<PartitionHandle>,
    anomaly_sink: Arc<AnomalySink>,
    counters: Arc<Counters>,
    state: AtomicU8,
}

impl Engine {
    /// Validates `config` and allocates (but does not start) partitions,
    /// queues, and the anomaly sink.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let partition_count = config.resolved_partitions();
        let partitions = (0..partition_count)
            .map(|_| PartitionHandle::new(config.channel_capacity))
            .collect();
        let anomaly_sink = Arc::new(AnomalySink::new(config.effective_anomaly_capacity()));

        Ok(Self {
            config: Arc::new(config),
            partitions,
            anomaly_sink,
            counters: Arc::new(Counters::default()),
            state: AtomicU8::new(CONSTRUCTED),
        })
    }

    /// Launches one worker per partition. Legal only from `Constructed`.
    pub fn start(&self) -> Result<(), EngineError> {
        self.state
            .compare_exchange(CONSTRUCTED, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| EngineError::AlreadyRunning)?;

        for (id, partition) in self.partitions.iter().enumerate() {
            partition.start(
                id,
                self.config.clone(),
                self.anomaly_sink.clone(),
                self.counters.clone(),
            );
        }
        tracing::info!(partitions = self.partitions.len(), "engine started");
        Ok(())
    }

    /// Signals shutdown, closes all queues, and awaits each worker with a
    /// bounded timeout. Idempotent once `Stopping`/`Stopped`; a no-op if
    /// the engine was never started.
    pub async fn stop(&self) -> Result<(), EngineError> {
        match self
            .state
            .compare_exchange(RUNNING, STOPPING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(CONSTRUCTED) => {
                self.state.store(STOPPED, Ordering::Release);
                return Ok(());
            }
            Err(_) => return Ok(()), // already Stopping or Stopped: idempotent
        }

        let mut any_timed_out = false;
        for partition in &self.partitions {
            if !partition.stop(SHUTDOWN_TIMEOUT).await {
                any_timed_out = true;
            }
        }
        self.state.store(STOPPED, Ordering::Release);

        if any_timed_out {
            tracing::warn!("engine stopped with at least one worker past its shutdown timeout");
            return Err(EngineError::ShutdownTimeout(SHUTDOWN_TIMEOUT));
        }
        tracing::info!("engine stopped");
        Ok(())
    }

    /// Validates and routes a tick to its owning partition's queue.
    /// Non-blocking: a full queue drops its oldest entry (spec §4.9).
    pub fn enqueue(&self, tick: Tick) -> Result<(), EngineError> {
        let state = self.state.load(Ordering::Acquire);
        if state != RUNNING && state != STOPPING {
            return Err(EngineError::NotRunning);
        }

        if tick.symbol.is_empty() {
            return Err(EngineError::InvalidInput("symbol must not be empty".into()));
        }
        if tick.symbol.chars().count() > MAX_SYMBOL_LEN {
            return Err(EngineError::InvalidInput(format!(
                "symbol must be at most {MAX_SYMBOL_LEN} characters",
            )));
        }
        if tick.price <= Decimal::ZERO {
            return Err(EngineError::InvalidInput("price must be positive".into()));
        }

        let normalized = Tick {
            symbol: tick.symbol.to_uppercase(),
            ..tick
        };

        let idx = partition_index(&normalized.symbol, self.partitions.len());
        let dropped = self.partitions[idx].queue.push(normalized);
        if dropped {
            self.counters.dropped_ticks.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Returns an owned snapshot of `symbol`'s statistics, or `None` if
    /// no tick for it has been processed yet.
    pub fn try_get_statistics(&self, symbol: &str) -> Option<Statistics> {
        let symbol = symbol.to_uppercase();
        let idx = partition_index(&symbol, self.partitions.len());
        self.partitions[idx].try_get_statistics(&symbol)
    }

    /// Returns a snapshot of every symbol's statistics. Ordering is
    /// unspecified; the set is not a single global point-in-time view
    /// (spec §4.6).
    pub fn list_all_statistics(&self) -> Vec<Statistics> {
        self.partitions
            .iter()
            .flat_map(|p| p.list_all_statistics())
            .collect()
    }

    /// Returns up to `take` recently detected spikes, newest first,
    /// optionally restricted to `symbol_filter`.
    pub fn recent_spikes(&self, take: usize, symbol_filter: Option<&str>) -> Vec<Spike> {
        self.anomaly_sink.recent(take, symbol_filter)
    }

    /// Snapshot of engine-wide counters and gauges (spec §4.6).
    pub fn metrics(&self) -> Metrics {
        let (total_processed, spikes_detected, dropped_ticks, processing_errors) =
            self.counters.snapshot();
        let active_symbols = self.partitions.iter().map(|p| p.active_symbols()).sum();
        let total_queue_depth = self.partitions.iter().map(|p| p.queue_depth()).sum();

        Metrics {
            total_processed,
            spikes_detected,
            active_symbols,
            total_queue_depth,
            dropped_ticks,
            processing_errors,
        }
    }

    /// Number of partitions this engine was constructed with (after
    /// resolving the `partitions = 0` "available parallelism" sentinel).
    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}
