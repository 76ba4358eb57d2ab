//! Counters for the dispatch loop.

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of dispatch metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMetricsSnapshot {
    /// Work items accepted through a handle.
    pub submitted: u64,
    /// Work items fired by the advance loop.
    pub fired: u64,
    /// Work items still pending when shutdown discarded them.
    pub discarded_on_shutdown: u64,
    /// Times a worker woke from its park, for any reason.
    pub park_wakeups: u64,
}

/// Thread-safe dispatch counters.
///
/// All operations are lock-free and may be called concurrently from any
/// thread without coordination.
#[derive(Debug, Default)]
pub struct DispatchMetrics {
    submitted: AtomicU64,
    fired: AtomicU64,
    discarded_on_shutdown: AtomicU64,
    park_wakeups: AtomicU64,
}

impl DispatchMetrics {
    pub(crate) fn incr_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add_fired(&self, count: u64) {
        if count > 0 {
            self.fired.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn add_discarded(&self, count: u64) {
        if count > 0 {
            self.discarded_on_shutdown.fetch_add(count, Ordering::Relaxed);
        }
    }

    pub(crate) fn incr_park_wakeups(&self) {
        self.park_wakeups.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchMetricsSnapshot {
        DispatchMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            fired: self.fired.load(Ordering::Relaxed),
            discarded_on_shutdown: self.discarded_on_shutdown.load(Ordering::Relaxed),
            park_wakeups: self.park_wakeups.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_into_snapshots() {
        let metrics = DispatchMetrics::default();
        metrics.incr_submitted();
        metrics.incr_submitted();
        metrics.add_fired(3);
        metrics.add_fired(0);
        metrics.add_discarded(1);
        metrics.incr_park_wakeups();

        let snap = metrics.snapshot();
        assert_eq!(snap.submitted, 2);
        assert_eq!(snap.fired, 3);
        assert_eq!(snap.discarded_on_shutdown, 1);
        assert_eq!(snap.park_wakeups, 1);
    }
}
