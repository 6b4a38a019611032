//! Infrastructure components: config, logging, metrics, worker pool

pub mod config;
pub mod logging;
pub mod metrics;
pub mod pool;

pub use config::DispatcherConfig;
pub use logging::{DispatchLogger, TracingLogger};
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use pool::WorkerPool;
