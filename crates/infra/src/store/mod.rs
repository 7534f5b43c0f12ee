//! Storage boundary for orders and product stock.
//!
//! The lifecycle engine and the reconciler depend only on these traits; one
//! implementation exists per backing technology (in-memory here, DynamoDB behind
//! the `aws` feature). Every operation is atomic at single-key granularity only:
//! there is no cross-key transaction.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockflow_core::{OrderId, ProductId};
use stockflow_orders::Order;

pub mod in_memory;

#[cfg(feature = "aws")]
pub mod dynamodb;

pub use in_memory::{InMemoryInventoryStore, InMemoryOrderStore};

#[cfg(feature = "aws")]
pub use dynamodb::{DynamoInventoryStore, DynamoOrderStore};

/// Storage operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(String),

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Durable key-value storage for order records, keyed by order id.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError>;

    /// Every stored record, soft-deleted ones included, in storage order.
    async fn scan(&self) -> Result<Vec<Order>, StoreError>;

    /// Create or replace.
    async fn put(&self, order: &Order) -> Result<(), StoreError>;

    /// Physically remove a record.
    async fn delete(&self, id: &OrderId) -> Result<(), StoreError>;
}

/// Stock counters keyed by product id.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Atomically apply `stock += delta` to an existing product; returns the new count.
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, StoreError>;
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        (**self).get(id).await
    }

    async fn scan(&self) -> Result<Vec<Order>, StoreError> {
        (**self).scan().await
    }

    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        (**self).put(order).await
    }

    async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[async_trait]
impl<S> InventoryStore for Arc<S>
where
    S: InventoryStore + ?Sized,
{
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, StoreError> {
        (**self).adjust_stock(product_id, delta).await
    }
}
