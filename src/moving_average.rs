//! Fixed-capacity circular buffer yielding the arithmetic mean of the last
//! `W` pushed values in O(1) (spec §4.1).
//!
//! Grounded on the teacher's `DataProcessor`'s SMA block (`data_processor.
//! rs`): a running `sum` plus a write index advanced with the teacher's
//! branchless `bound_index` wrap helper (`utils.rs`), generalized from a
//! single fixed-size ring owned by one `DataProcessor` into a reusable,
//! independently-constructible buffer type any `SymbolState` can own.

use crate::error::EngineError;
use crate::util::bound_index;

/// Resum the live buffer after this many pushes, bounding floating-point
/// drift in `sum` (spec §4.1: "compensate every 2^20 pushes").
const RESUM_INTERVAL: u32 = 1 << 20;

/// O(1) ring-buffer moving average over the last `capacity` pushed values.
///
/// Single-owner; callers must serialize access (no internal locking).
#[derive(Debug, Clone)]
pub struct MovingAverageBuffer {
    buffer: Box<[f64]>,
    capacity: usize,
    index: usize,
    count: usize,
    sum: f64,
    pushes_since_resum: u32,
}

impl MovingAverageBuffer {
    /// Creates a new buffer of the given capacity `W`. Fails with
    /// [`EngineError::InvalidConfig`] if `capacity == 0`.
    pub fn new(capacity: usize) -> Result<Self, EngineError> {
        if capacity == 0 {
            return Err(EngineError::InvalidConfig(
                "moving_average_window must be > 0".into(),
            ));
        }
        Ok(Self {
            buffer: vec![0.0; capacity].into_boxed_slice(),
            capacity,
            index: 0,
            count: 0,
            sum: 0.0,
            pushes_since_resum: 0,
        })
    }

    /// Pushes a new value and returns the updated mean.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.count < self.capacity {
            self.buffer[self.index] = value;
            self.sum += value;
            self.count += 1;
        } else {
            let old = self.buffer[self.index];
            self.buffer[self.index] = value;
            self.sum += value - old;
        }
        self.index = bound_index(self.index + 1, self.capacity);

        self.pushes_since_resum += 1;
        if self.pushes_since_resum >= RESUM_INTERVAL {
            self.resum();
            self.pushes_since_resum = 0;
        }

        self.sum / self.count as f64
    }

    /// Recomputes `sum` directly from the live buffer, bounding
    /// accumulated floating-point error over long runs.
    fn resum(&mut self) {
        self.sum = self.buffer[..self.count].iter().sum();
    }

    /// Number of values observed so far (saturates at `capacity`).
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
