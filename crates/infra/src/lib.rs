//! Infrastructure layer: storage backends, transport adapters, the order
//! lifecycle engine, the stock reconciler and the ingestion worker.

pub mod config;
pub mod event_bus;
pub mod lifecycle;
pub mod reconciler;
pub mod store;
pub mod workers;

#[cfg(feature = "aws")]
pub mod aws;
