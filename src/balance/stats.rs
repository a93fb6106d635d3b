//! Per-worker counters.
//!
//! Updated with atomics from the worker loop (completions) and the dispatch
//! path (queue depth), read concurrently through [`WorkerStats::snapshot`].

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

/// Live counters of one worker.
#[derive(Debug)]
pub struct WorkerStats {
    in_queue: AtomicUsize,
    succeeded: AtomicU64,
    errored: AtomicU64,
    total_nanos: AtomicU64,
    min_nanos: AtomicU64,
    max_nanos: AtomicU64,
}

impl Default for WorkerStats {
    fn default() -> Self {
        Self {
            in_queue: AtomicUsize::new(0),
            succeeded: AtomicU64::new(0),
            errored: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            min_nanos: AtomicU64::new(u64::MAX),
            max_nanos: AtomicU64::new(0),
        }
    }
}

impl WorkerStats {
    /// Items queued or in flight.
    pub fn depth(&self) -> usize {
        self.in_queue.load(Ordering::Acquire)
    }

    pub(crate) fn enqueued(&self) {
        self.in_queue.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn dequeued(&self) {
        // Never wraps: every decrement pairs with an earlier increment.
        let _ = self
            .in_queue
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    /// Records one finished item.
    pub(crate) fn record(&self, elapsed: Duration, ok: bool) {
        let nanos = elapsed.as_nanos().min(u128::from(u64::MAX)) as u64;
        if ok {
            self.succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.errored.fetch_add(1, Ordering::Relaxed);
        }
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.min_nanos.fetch_min(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let errored = self.errored.load(Ordering::Relaxed);
        let processed = succeeded + errored;
        let min = self.min_nanos.load(Ordering::Relaxed);

        WorkerStatsSnapshot {
            in_queue: self.depth(),
            succeeded,
            errored,
            total: Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed)),
            min: (processed > 0 && min != u64::MAX).then(|| Duration::from_nanos(min)),
            max: (processed > 0)
                .then(|| Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed))),
        }
    }
}

/// Read-only copy of [`WorkerStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStatsSnapshot {
    pub in_queue: usize,
    pub succeeded: u64,
    pub errored: u64,
    /// Sum of all item durations.
    pub total: Duration,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
}

impl WorkerStatsSnapshot {
    pub fn processed(&self) -> u64 {
        self.succeeded + self.errored
    }

    /// Mean item duration, `None` before the first item finished.
    pub fn average(&self) -> Option<Duration> {
        match self.processed() {
            0 => None,
            n => Some(self.total / n.min(u64::from(u32::MAX)) as u32),
        }
    }
}
