//! HTTP application wiring (Axum router + backend wiring).
//!
//! - `services.rs`: backend selection (in-memory or AWS) and the lifecycle engine
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs` and the black-box tests).
///
/// Order routes are served both at the root and under `/api`.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/healthz", get(routes::system::healthz))
        .merge(routes::router())
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(Extension(services))
                .layer(axum::middleware::from_fn(middleware::trace_context_middleware)),
        )
}
