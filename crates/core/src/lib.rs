//! `stockflow-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the order authority
//! and the inventory reconciler (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod trace;

pub use error::{DomainError, DomainResult};
pub use id::{OrderId, ProductId};
pub use trace::TraceContext;
