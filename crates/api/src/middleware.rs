use axum::{
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use stockflow_core::TraceContext;

pub const TRACEPARENT: &str = "traceparent";

/// Derive the request's correlation context from the inbound `traceparent`
/// header (child of a valid one, fresh root otherwise), expose it to handlers
/// as an extension and echo it on the response.
pub async fn trace_context_middleware(mut req: Request<axum::body::Body>, next: Next) -> Response {
    let inbound = req.headers().get(TRACEPARENT).and_then(|v| v.to_str().ok());
    let trace = TraceContext::continue_from(inbound);

    let span = stockflow_observability::correlation_span("http_request", &trace);
    span.in_scope(|| {
        tracing::debug!(method = %req.method(), path = %req.uri().path(), "request received");
    });

    req.extensions_mut().insert(trace.clone());
    let mut response = next.run(req).instrument(span).await;

    if let Ok(value) = HeaderValue::from_str(&trace.to_traceparent()) {
        response.headers_mut().insert(TRACEPARENT, value);
    }
    response
}
