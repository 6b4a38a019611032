//! Hierarchical key-sequenced callback dispatcher
//!
//! A tree of FIFO queues keyed by slash-delimited names (`"MarketData/AUD/Swap"`).
//! Work dispatched through a [`DispatchHandle`] runs on a shared worker pool with
//! two guarantees: an ancestor's own-level callback never overlaps any callback
//! in its descendant subtree, and dispatches sharing a key prefix keep their
//! arrival order at every shared ancestor. Divergent keys run concurrently.

pub mod dispatch;
pub mod infrastructure;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types
pub use dispatch::{DispatchHandle, Dispatcher};
pub use infrastructure::config::DispatcherConfig;
pub use infrastructure::logging::{DispatchLogger, TracingLogger};
pub use infrastructure::metrics::MetricsSnapshot;

use thiserror::Error;

/// Main error type for the dispatcher
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, DispatchError>;
