//! Engine-wide atomic counters (spec §4.6, §5: "Global counters ...
//! atomic integer fetch-add").

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub(crate) struct Counters {
    pub(crate) total_processed: AtomicU64,
    pub(crate) spikes_detected: AtomicU64,
    pub(crate) dropped_ticks: AtomicU64,
    pub(crate) processing_errors: AtomicU64,
}

impl Counters {
    pub(crate) fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.total_processed.load(Ordering::Relaxed),
            self.spikes_detected.load(Ordering::Relaxed),
            self.dropped_ticks.load(Ordering::Relaxed),
            self.processing_errors.load(Ordering::Relaxed),
        )
    }
}
