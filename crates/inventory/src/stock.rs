use serde::{Deserialize, Serialize};
use thiserror::Error;

use stockflow_core::ProductId;
use stockflow_events::{EventItem, LifecycleEventType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("unsupported order event type: {0}")]
    UnsupportedEventType(String),
}

/// Stock counter for one product.
///
/// Stock has no floor: decrementing past zero yields a negative count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductStock {
    pub id: ProductId,
    pub stock: i64,
}

impl ProductStock {
    pub fn new(id: ProductId, stock: i64) -> Self {
        Self { id, stock }
    }

    /// Apply an additive update; returns the new count.
    pub fn apply(&mut self, delta: i64) -> i64 {
        self.stock += delta;
        self.stock
    }
}

/// Signed stock change for one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub delta: i64,
}

impl StockAdjustment {
    /// Adjustment for one event line.
    pub fn for_item(event_type: &LifecycleEventType, item: &EventItem) -> Result<Self, InventoryError> {
        Ok(Self {
            product_id: item.product_id.clone(),
            delta: stock_delta(event_type, item.quantity)?,
        })
    }
}

/// Map an event type to a signed delta:
/// - `order.created` decrements by the quantity
/// - `order.canceled` (cancellations and returns alike) restocks by the quantity
pub fn stock_delta(event_type: &LifecycleEventType, quantity: u32) -> Result<i64, InventoryError> {
    let quantity = i64::from(quantity);
    match event_type {
        LifecycleEventType::OrderCreated => Ok(-quantity),
        LifecycleEventType::OrderCanceled => Ok(quantity),
        LifecycleEventType::Other(other) => Err(InventoryError::UnsupportedEventType(other.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn created_decrements_and_canceled_restocks() {
        assert_eq!(stock_delta(&LifecycleEventType::OrderCreated, 3), Ok(-3));
        assert_eq!(stock_delta(&LifecycleEventType::OrderCanceled, 3), Ok(3));
    }

    #[test]
    fn other_types_are_unsupported() {
        let err = stock_delta(&LifecycleEventType::Other("order.returned".into()), 1).unwrap_err();
        assert_eq!(err, InventoryError::UnsupportedEventType("order.returned".into()));
    }

    #[test]
    fn stock_can_go_negative() {
        let mut rec = ProductStock::new(ProductId::new("p1"), 1);
        assert_eq!(rec.apply(-3), -2);
    }

    #[test]
    fn adjustment_targets_item_product() {
        let item = EventItem {
            product_id: ProductId::new("p7"),
            product_name: None,
            quantity: 4,
        };
        let adj = StockAdjustment::for_item(&LifecycleEventType::OrderCreated, &item).unwrap();
        assert_eq!(adj, StockAdjustment { product_id: ProductId::new("p7"), delta: -4 });
    }

    proptest! {
        /// Property: a created/canceled pair for the same quantity nets to zero.
        #[test]
        fn create_then_cancel_nets_zero(start in -1_000i64..1_000, qty in 1u32..10_000) {
            let mut rec = ProductStock::new(ProductId::new("p"), start);
            rec.apply(stock_delta(&LifecycleEventType::OrderCreated, qty).unwrap());
            rec.apply(stock_delta(&LifecycleEventType::OrderCanceled, qty).unwrap());
            prop_assert_eq!(rec.stock, start);
        }
    }
}
