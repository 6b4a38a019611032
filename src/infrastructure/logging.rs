//! Logging collaborator and file-based log setup
//!
//! The dispatcher never propagates callback panics; it reports them through a
//! [`DispatchLogger`] supplied at construction. The trait is object-safe and
//! must be callable from arbitrary worker threads concurrently.
//!
//! `init_logging` wires up file appenders for processes that want them:
//! - logs/main.log - general application logs
//! - logs/error.log - error and warning logs only

use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
    EnvFilter,
};

/// Thread-safe logging collaborator for the dispatcher
///
/// Implementations must tolerate concurrent calls from pool workers.
pub trait DispatchLogger: Send + Sync {
    /// A user callback panicked; the panic was contained and the slot freed
    fn callback_panic(&self, label: &str, detail: &str);

    /// The outstanding-item count crossed the soft backlog limit
    fn backlog_warning(&self, label: &str, outstanding: usize, limit: usize);
}

/// Default logger emitting through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl DispatchLogger for TracingLogger {
    fn callback_panic(&self, label: &str, detail: &str) {
        tracing::error!(target: "dispatch", dispatcher = label, "callback panicked: {detail}");
    }

    fn backlog_warning(&self, label: &str, outstanding: usize, limit: usize) {
        tracing::warn!(
            target: "dispatch",
            dispatcher = label,
            outstanding,
            limit,
            "outstanding items crossed soft backlog limit"
        );
    }
}

/// Initialize file logging
///
/// Creates logs/ directory and sets up rolling appenders plus a console
/// layer. Returns WorkerGuards which must be kept alive for the duration of
/// the program.
pub fn init_logging() -> Vec<WorkerGuard> {
    let logs_dir = Path::new("logs");
    if !logs_dir.exists() {
        fs::create_dir_all(logs_dir).expect("Failed to create logs directory");
    }

    let mut guards = Vec::new();

    // Main log - all logs
    let (main_appender, main_guard) = create_appender("logs/main", "main");
    guards.push(main_guard);

    // Error log - ERROR and WARN only
    let (error_appender, error_guard) = create_appender("logs/error", "error");
    guards.push(error_guard);

    let main_layer = tracing_subscriber::fmt::layer()
        .with_writer(main_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json();

    let error_layer = tracing_subscriber::fmt::layer()
        .with_writer(error_appender)
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_filter(tracing_subscriber::filter::LevelFilter::WARN);

    // Console layer for development
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_level(true);

    tracing_subscriber::registry()
        .with(EnvFilter::new("info"))
        .with(main_layer)
        .with(error_layer)
        .with(console_layer)
        .init();

    tracing::info!("Logging system initialized. Log files in logs/ directory");

    guards
}

/// Create a rolling file appender
fn create_appender(dir: &str, name: &str) -> (NonBlocking, WorkerGuard) {
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, name);

    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    (non_blocking, guard)
}
