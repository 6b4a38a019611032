//! Shared worker pool for scan tasks and user callbacks
//!
//! A fixed set of named OS threads draining a single unbounded channel.
//! Scan passes and wrapped callbacks are both submitted here; nodes are
//! passive data and never own a thread.

use crossbeam::channel::{unbounded, Sender};
use std::thread::{self, JoinHandle};

/// Boxed unit of work executed on a pool thread
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed-size pool of worker threads
///
/// `execute` never blocks: jobs queue on an unbounded channel. Dropping the
/// pool disconnects the channel and joins every worker after it drains the
/// jobs already submitted.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `workers` named threads (`{label}-wN`)
    pub fn new(label: &str, workers: usize) -> Self {
        let count = workers.max(1);
        let (tx, rx) = unbounded::<Job>();

        let workers = (0..count)
            .map(|i| {
                let rx = rx.clone();
                thread::Builder::new()
                    .name(format!("{label}-w{i}"))
                    .spawn(move || {
                        // Recv fails only when all senders are gone
                        while let Ok(job) = rx.recv() {
                            job();
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            tx: Some(tx),
            workers,
        }
    }

    /// Submit a job for execution
    ///
    /// O(1), lock-free channel push. Send can only fail after the pool has
    /// started shutting down, in which case the job is dropped.
    #[inline]
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Box::new(job));
        }
    }

    /// Number of worker threads
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Disconnect the channel so workers exit once drained
        self.tx.take();
        // The last reference to the owning dispatcher can be released from a
        // pool job, in which case this drop runs on a worker thread; that
        // worker detaches itself instead of self-joining.
        let current = thread::current().id();
        for handle in self.workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
    }
}
