//! Orders domain module.
//!
//! This crate contains the order record, its status state machine and the
//! soft-delete policy, implemented purely as deterministic domain logic
//! (no IO, no HTTP, no storage).

pub mod order;

pub use order::{Order, OrderItem, OrderPatch, OrderStatus};
