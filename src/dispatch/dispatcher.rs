//! Dispatcher facade: owns the tree, the pool and the global counters

use crate::dispatch::{DispatchHandle, Node};
use crate::infrastructure::config::DispatcherConfig;
use crate::infrastructure::logging::DispatchLogger;
use crate::infrastructure::metrics::{DispatchMetrics, MetricsSnapshot};
use crate::infrastructure::pool::WorkerPool;
use crate::{DispatchError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Shared state behind every handle and in-flight item
pub(crate) struct DispatcherCore {
    label: String,
    root: Arc<Node>,
    pool: WorkerPool,
    /// Dispatched items not yet completed, soft-capped with a warning
    outstanding: AtomicUsize,
    soft_backlog_limit: usize,
    wait_poll: Duration,
    logger: Arc<dyn DispatchLogger>,
    metrics: DispatchMetrics,
}

impl DispatcherCore {
    #[inline]
    pub(crate) fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Count a new dispatch; crossing the soft limit logs a single warning
    /// per upward crossing but never blocks or rejects.
    pub(crate) fn inc_outstanding(&self) {
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        if now == self.soft_backlog_limit + 1 {
            self.logger
                .backlog_warning(&self.label, now, self.soft_backlog_limit);
        }
        self.metrics.record_dispatch(now);
    }

    pub(crate) fn dec_outstanding(&self) {
        let prev = self.outstanding.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "outstanding underflow");
        self.metrics.record_completion();
    }

    pub(crate) fn record_callback_panic(&self, detail: &str) {
        self.metrics.record_callback_panic();
        self.logger.callback_panic(&self.label, detail);
    }
}

/// Hierarchical key-sequenced callback dispatcher
///
/// Resolve a slash-delimited key once into a [`DispatchHandle`], then
/// dispatch callbacks through it. Callbacks run on a shared worker pool
/// under two guarantees: per-node own-level callbacks are serialized and
/// mutually exclusive with the node's entire descendant subtree, and
/// dispatches sharing a key prefix preserve arrival order at every shared
/// ancestor.
///
/// # Example
/// ```no_run
/// use keyseq::{Dispatcher, TracingLogger};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let dispatcher = Dispatcher::new(Arc::new(TracingLogger), "pricing");
/// let handle = dispatcher.resolve("MarketData/AUD/Swap").unwrap();
/// handle.dispatch(|| println!("curve rebuilt"));
/// dispatcher.wait(Duration::from_secs(5));
/// ```
pub struct Dispatcher {
    core: Arc<DispatcherCore>,
}

impl Dispatcher {
    /// Create a dispatcher with default configuration
    ///
    /// The logger collaborator is required; it is invoked from arbitrary
    /// worker threads for callback panics and backlog warnings. The label
    /// appears in those log lines and in worker thread names.
    pub fn new(logger: Arc<dyn DispatchLogger>, label: impl Into<String>) -> Self {
        Self::with_config(logger, label, DispatcherConfig::default())
    }

    /// Create a dispatcher with explicit configuration
    pub fn with_config(
        logger: Arc<dyn DispatchLogger>,
        label: impl Into<String>,
        config: DispatcherConfig,
    ) -> Self {
        let label = label.into();
        let pool = WorkerPool::new(&label, config.effective_workers());
        Self {
            core: Arc::new(DispatcherCore {
                root: Node::root(),
                pool,
                outstanding: AtomicUsize::new(0),
                soft_backlog_limit: config.soft_backlog_limit,
                wait_poll: config.wait_poll_interval(),
                logger,
                metrics: DispatchMetrics::new(),
                label,
            }),
        }
    }

    /// Resolve a hierarchical key into a dispatch handle
    ///
    /// The key is split on `/`; the empty string denotes the root (depth 0).
    /// No escaping of `/` inside a segment is supported. Nodes along the
    /// path are created on first resolution and live for the dispatcher's
    /// lifetime.
    ///
    /// # Errors
    /// Returns [`DispatchError::InvalidKey`] for non-ASCII keys.
    pub fn resolve(&self, key: &str) -> Result<DispatchHandle> {
        if !key.is_ascii() {
            return Err(DispatchError::InvalidKey(format!(
                "key must be ASCII: {key:?}"
            )));
        }
        let path = if key.is_empty() {
            self.core.root.resolve_path(&[])
        } else {
            let segments: Vec<&str> = key.split('/').collect();
            self.core.root.resolve_path(&segments)
        };
        Ok(DispatchHandle::new(Arc::clone(&self.core), path))
    }

    /// Block until all outstanding items complete or the timeout elapses
    ///
    /// Coarse polling on the configured interval (default 50ms), intended
    /// for shutdown and drain, not low-latency signaling. Returns the
    /// remaining outstanding count (0 = fully drained). A zero timeout is a
    /// single probe of the counter.
    pub fn wait(&self, timeout: Duration) -> usize {
        let start = Instant::now();
        loop {
            let remaining = self.core.outstanding.load(Ordering::SeqCst);
            if remaining == 0 {
                return 0;
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return remaining;
            }
            std::thread::sleep(self.core.wait_poll.min(timeout - elapsed));
        }
    }

    /// Currently outstanding (dispatched, not yet completed) items
    #[inline]
    pub fn outstanding(&self) -> usize {
        self.core.outstanding.load(Ordering::SeqCst)
    }

    /// Number of callbacks that panicked so far (diagnostic only)
    #[inline]
    pub fn panic_count(&self) -> u64 {
        self.core.metrics.callback_panics()
    }

    /// Point-in-time metrics snapshot
    pub fn metrics(&self) -> MetricsSnapshot {
        self.core.metrics.snapshot()
    }

    /// The logger collaborator supplied at construction
    pub fn logger(&self) -> &Arc<dyn DispatchLogger> {
        &self.core.logger
    }

    /// Debug label supplied at construction
    pub fn label(&self) -> &str {
        &self.core.label
    }
}


#[cfg(test)]
mod ordering_props {
    use super::*;
    use crate::test_utils::{drain, test_dispatcher};
    use parking_lot::Mutex;
    use proptest::prelude::*;

    /// Start/end events recorded by callbacks, item index + phase
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Phase {
        Start(usize),
        End(usize),
    }

    fn arb_key() -> impl Strategy<Value = String> {
        // Keys up to three levels deep over a two-segment alphabet
        proptest::collection::vec(prop_oneof![Just("a"), Just("b")], 0..=3)
            .prop_map(|segments| segments.join("/"))
    }

    fn lineage_related(a: &str, b: &str) -> bool {
        a.is_empty()
            || b.is_empty()
            || a == b
            || a.starts_with(&format!("{b}/"))
            || b.starts_with(&format!("{a}/"))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        // For lineage-related keys, an earlier dispatch fully completes
        // before a later one starts.
        #[test]
        fn prop_prefix_arrival_order_preserved(keys in proptest::collection::vec(arb_key(), 1..20)) {
            let (dispatcher, _) = test_dispatcher(4);
            let events: Arc<Mutex<Vec<Phase>>> = Arc::new(Mutex::new(Vec::new()));

            for (index, key) in keys.iter().enumerate() {
                let handle = dispatcher.resolve(key).unwrap();
                let events = Arc::clone(&events);
                handle.dispatch(move || {
                    events.lock().push(Phase::Start(index));
                    std::thread::sleep(Duration::from_millis(1));
                    events.lock().push(Phase::End(index));
                });
            }
            drain(&dispatcher);

            let log = events.lock();
            let position = |phase: Phase| log.iter().position(|e| *e == phase).unwrap();
            for i in 0..keys.len() {
                for j in (i + 1)..keys.len() {
                    if lineage_related(&keys[i], &keys[j]) {
                        prop_assert!(
                            position(Phase::End(i)) < position(Phase::Start(j)),
                            "item {} ({:?}) must fully precede item {} ({:?})",
                            i, keys[i], j, keys[j]
                        );
                    }
                }
            }
        }
    }
}
