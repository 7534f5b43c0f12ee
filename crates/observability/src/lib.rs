//! Tracing and logging setup shared by the API and the worker.

/// Initialize process-wide tracing/logging.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Subscriber setup and correlation spans.
pub mod tracing;

pub use crate::tracing::correlation_span;
