//! Inventory domain module.
//!
//! Stock records and the rules that turn lifecycle events into stock
//! adjustments (no IO, no storage).

pub mod stock;

pub use stock::{InventoryError, ProductStock, StockAdjustment, stock_delta};
