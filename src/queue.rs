//! Bounded, drop-oldest, multi-producer/single-consumer tick queue (spec
//! §4.5, §5).
//!
//! Producers never block: a full queue drops its oldest element to make
//! room for the newest (spec §4.9). The consumer's wait is cooperative via
//! `tokio::sync::Notify`, never a busy spin, matching the teacher's
//! `RpcManager::init_run`'s use of `tokio::time::interval` for scheduled,
//! non-polling waits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::types::Tick;

pub struct BoundedQueue {
    inner: Mutex<VecDeque<Tick>>,
    capacity: usize,
    notify: Notify,
    closed: AtomicBool,
}

impl BoundedQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity,
            notify: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Appends `tick`, dropping the oldest entry first if the queue is at
    /// capacity. Returns `true` if a tick was dropped to make room.
    pub fn push(&self, tick: Tick) -> bool {
        let dropped = {
            let mut guard = self.inner.lock();
            let dropped = if guard.len() >= self.capacity {
                guard.pop_front();
                true
            } else {
                false
            };
            guard.push_back(tick);
            dropped
        };
        self.notify.notify_one();
        dropped
    }

    /// Waits cooperatively for the next tick. Returns `None` only once the
    /// queue has been closed *and* fully drained — a closed-but-nonempty
    /// queue still yields its remaining items first, satisfying the
    /// best-effort drain-on-shutdown requirement (spec §4.5, §4.9).
    pub async fn pop(&self) -> Option<Tick> {
        loop {
            {
                let mut guard = self.inner.lock();
                if let Some(tick) = guard.pop_front() {
                    return Some(tick);
                }
                if self.closed.load(Ordering::Acquire) {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Current number of queued ticks.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Signals shutdown: no further waiting on an empty queue; any waiter
    /// parked in `pop` wakes up and observes the closed flag.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn tick(symbol: &str) -> Tick {
        Tick::new(symbol, dec!(1), Utc::now())
    }

    #[test]
    fn p9_drop_oldest_under_backpressure() {
        let q = BoundedQueue::new(3);
        assert!(!q.push(tick("A")));
        assert!(!q.push(tick("B")));
        assert!(!q.push(tick("C")));
        // queue full: D, E each evict the oldest remaining entry.
        assert!(q.push(tick("D")));
        assert!(q.push(tick("E")));
        assert_eq!(q.len(), 3);
    }

    #[tokio::test]
    async fn s6_drop_oldest_scenario_preserves_fifo_order_of_survivors() {
        let q = BoundedQueue::new(3);
        let mut dropped = 0;
        for s in ["A", "B", "C", "D", "E"] {
            if q.push(tick(s)) {
                dropped += 1;
            }
        }
        assert_eq!(dropped, 2);
        assert_eq!(q.len(), 3);

        let mut order = Vec::new();
        while let Some(t) = {
            if q.is_empty() {
                None
            } else {
                q.pop().await
            }
        } {
            order.push(t.symbol);
        }
        assert_eq!(order, vec!["C", "D", "E"]);
    }

    #[tokio::test]
    async fn pop_returns_none_once_closed_and_drained() {
        let q = BoundedQueue::new(3);
        q.push(tick("A"));
        q.close();
        assert_eq!(q.pop().await.map(|t| t.symbol), Some("A".to_string()));
        assert!(q.pop().await.is_none());
    }
}
