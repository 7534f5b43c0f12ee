//! Order authority HTTP API: routing, request/response mapping and backend wiring.

pub mod app;
pub mod middleware;
