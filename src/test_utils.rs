//! Test utilities: counting logger, drain helper, concurrency probe
//!
//! Tests construct dispatchers through `test_dispatcher` so panics and
//! warnings are observable without a tracing subscriber.

use crate::infrastructure::config::DispatcherConfig;
use crate::infrastructure::logging::DispatchLogger;
use crate::Dispatcher;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Logger that counts invocations instead of emitting
#[derive(Default)]
pub struct CountingLogger {
    panics: AtomicUsize,
    warnings: AtomicUsize,
}

impl CountingLogger {
    pub fn panics(&self) -> usize {
        self.panics.load(Ordering::SeqCst)
    }

    pub fn warnings(&self) -> usize {
        self.warnings.load(Ordering::SeqCst)
    }
}

impl DispatchLogger for CountingLogger {
    fn callback_panic(&self, _label: &str, _detail: &str) {
        self.panics.fetch_add(1, Ordering::SeqCst);
    }

    fn backlog_warning(&self, _label: &str, _outstanding: usize, _limit: usize) {
        self.warnings.fetch_add(1, Ordering::SeqCst);
    }
}

/// Dispatcher with a counting logger, fast wait polling and `workers` threads
pub fn test_dispatcher(workers: usize) -> (Dispatcher, Arc<CountingLogger>) {
    let logger = Arc::new(CountingLogger::default());
    let dispatcher = Dispatcher::with_config(
        logger.clone(),
        "test",
        DispatcherConfig {
            workers,
            soft_backlog_limit: 1_000_000,
            wait_poll_ms: 2,
        },
    );
    (dispatcher, logger)
}

/// Wait for the dispatcher to fully drain; panics if it does not
pub fn drain(dispatcher: &Dispatcher) {
    let remaining = dispatcher.wait(Duration::from_secs(30));
    assert_eq!(remaining, 0, "dispatcher failed to drain");
}

/// Tracks how many callbacks are inside a region at once
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Enter the region; the guard exits on drop
    pub fn enter(&self) -> ProbeGuard<'_> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        ProbeGuard { probe: self }
    }

    /// Enter, hold the region for `dwell`, exit
    pub fn run(&self, dwell: Duration) {
        let _guard = self.enter();
        std::thread::sleep(dwell);
    }

    /// Callbacks currently inside the region
    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    /// Highest concurrency ever observed
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Default for ConcurrencyProbe {
    fn default() -> Self {
        Self::new()
    }
}

pub struct ProbeGuard<'a> {
    probe: &'a ConcurrencyProbe,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        self.probe.current.fetch_sub(1, Ordering::SeqCst);
    }
}
