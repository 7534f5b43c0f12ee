//! Tracing/logging initialization.
//!
//! Log lines are JSON with timestamps; the filter comes from `RUST_LOG`.
//! Correlation across the order service and the reconciler is by `trace_id`,
//! which every request and message span records.

use stockflow_core::TraceContext;
use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_current_span(true)
        .with_span_list(false)
        .with_target(false)
        .try_init();
}

/// Span tying `operation` to a correlation context.
pub fn correlation_span(operation: &'static str, trace: &TraceContext) -> ::tracing::Span {
    ::tracing::info_span!(
        "correlated",
        operation,
        trace_id = %trace.trace_id(),
        span_id = %trace.span_id(),
        sampled = trace.is_sampled(),
    )
}
