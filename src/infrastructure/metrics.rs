//! Metrics collection for dispatcher monitoring
//!
//! Lock-free counters using atomic operations. Updated from worker threads,
//! snapshotted for inspection. Diagnostics only: no value here ever affects
//! scheduling decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Dispatcher metrics collector
///
/// Thread-safe counters updated from dispatch and completion paths.
pub struct DispatchMetrics {
    /// Total items dispatched
    dispatched: AtomicU64,
    /// Total callbacks completed (including panicked ones)
    completed: AtomicU64,
    /// Total callbacks that panicked
    callback_panics: AtomicU64,
    /// Highest outstanding count observed
    peak_outstanding: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

/// Metrics snapshot for export
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub dispatched: u64,
    pub completed: u64,
    pub callback_panics: u64,
    pub peak_outstanding: u64,
    pub uptime_seconds: u64,
}

impl DispatchMetrics {
    pub fn new() -> Self {
        Self {
            dispatched: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            callback_panics: AtomicU64::new(0),
            peak_outstanding: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    #[inline]
    pub fn record_dispatch(&self, outstanding_now: usize) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.peak_outstanding
            .fetch_max(outstanding_now as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_completion(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_callback_panic(&self) {
        self.callback_panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of panicked callbacks so far
    #[inline]
    pub fn callback_panics(&self) -> u64 {
        self.callback_panics.load(Ordering::Relaxed)
    }

    /// Take a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            callback_panics: self.callback_panics.load(Ordering::Relaxed),
            peak_outstanding: self.peak_outstanding.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}
