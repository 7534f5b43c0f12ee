use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, instrument};

use stockflow_core::{OrderId, ProductId, TraceContext};
use stockflow_events::{LifecycleEvent, LifecycleEventType};
use stockflow_inventory::{InventoryError, StockAdjustment};

use crate::store::{InventoryStore, StoreError};
use crate::workers::MessageHandler;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("malformed lifecycle event: {0}")]
    MalformedEvent(String),

    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// `applied` items earlier in the event were already adjusted and stay adjusted.
    #[error("stock update for product {product_id} failed after {applied} item(s) applied: {source}")]
    Store {
        product_id: ProductId,
        applied: usize,
        source: StoreError,
    },
}

impl From<InventoryError> for ReconcileError {
    fn from(value: InventoryError) -> Self {
        match value {
            InventoryError::UnsupportedEventType(t) => ReconcileError::UnsupportedEventType(t),
        }
    }
}

/// Result of one successfully reconciled event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub order_id: OrderId,
    pub event_type: LifecycleEventType,
    pub adjusted_items: usize,
}

/// Applies lifecycle events to product stock, one additive update per item.
///
/// Items are adjusted in order and independently: a failure stops processing
/// but does not undo items already applied. Handling the same event twice
/// applies its deltas twice.
#[derive(Debug)]
pub struct StockReconciler<S> {
    store: S,
}

impl<S> StockReconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S> StockReconciler<S>
where
    S: InventoryStore,
{
    /// Parse `payload` as a lifecycle event and apply it.
    #[instrument(
        skip(self, trace, payload),
        fields(trace_id = %trace.trace_id(), span_id = %trace.span_id()),
        err
    )]
    pub async fn handle(&self, trace: &TraceContext, payload: &str) -> Result<ReconcileOutcome, ReconcileError> {
        let event = LifecycleEvent::from_json(payload).map_err(|e| ReconcileError::MalformedEvent(e.to_string()))?;
        self.apply(&event).await
    }

    /// Apply an already-decoded event.
    pub async fn apply(&self, event: &LifecycleEvent) -> Result<ReconcileOutcome, ReconcileError> {
        let mut applied = 0;
        for item in &event.items {
            let adjustment = StockAdjustment::for_item(&event.event_type, item)?;
            let stock = self
                .store
                .adjust_stock(&adjustment.product_id, adjustment.delta)
                .await
                .map_err(|source| ReconcileError::Store {
                    product_id: adjustment.product_id.clone(),
                    applied,
                    source,
                })?;
            debug!(
                product_id = %adjustment.product_id,
                delta = adjustment.delta,
                stock,
                "stock adjusted"
            );
            applied += 1;
        }

        info!(
            order_id = %event.order_id,
            event_type = %event.event_type,
            items = applied,
            "order event reconciled"
        );
        Ok(ReconcileOutcome {
            order_id: event.order_id.clone(),
            event_type: event.event_type.clone(),
            adjusted_items: applied,
        })
    }
}

#[async_trait]
impl<S> MessageHandler for StockReconciler<S>
where
    S: InventoryStore,
{
    type Error = ReconcileError;

    async fn handle(&self, trace: &TraceContext, payload: &str) -> Result<(), ReconcileError> {
        StockReconciler::handle(self, trace, payload).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use stockflow_events::EventItem;

    use crate::store::InMemoryInventoryStore;

    fn reconciler(stock: &[(&str, i64)]) -> StockReconciler<Arc<InMemoryInventoryStore>> {
        let store = Arc::new(InMemoryInventoryStore::new());
        for (id, qty) in stock {
            store.insert_product(ProductId::new(*id), *qty);
        }
        StockReconciler::new(store)
    }

    fn payload(event_type: &str, items: &[(&str, u32)]) -> String {
        LifecycleEvent::new(
            LifecycleEventType::from(event_type.to_string()),
            "o-1".parse().unwrap(),
            items
                .iter()
                .map(|(id, qty)| EventItem {
                    product_id: ProductId::new(*id),
                    product_name: None,
                    quantity: *qty,
                })
                .collect(),
            "2024-05-01T10:00:00Z",
        )
        .to_json()
        .unwrap()
    }

    fn stock(r: &StockReconciler<Arc<InMemoryInventoryStore>>, id: &str) -> Option<i64> {
        r.store().stock(&ProductId::new(id))
    }

    #[tokio::test]
    async fn created_then_canceled_nets_zero() {
        let r = reconciler(&[("p1", 10)]);
        let trace = TraceContext::new_root();

        r.handle(&trace, &payload("order.created", &[("p1", 3)])).await.unwrap();
        assert_eq!(stock(&r, "p1"), Some(7));

        let outcome = r.handle(&trace, &payload("order.canceled", &[("p1", 3)])).await.unwrap();
        assert_eq!(outcome.adjusted_items, 1);
        assert_eq!(stock(&r, "p1"), Some(10));
    }

    #[tokio::test]
    async fn same_event_twice_decrements_twice() {
        let r = reconciler(&[("p1", 10)]);
        let trace = TraceContext::new_root();
        let body = payload("order.created", &[("p1", 3)]);

        r.handle(&trace, &body).await.unwrap();
        r.handle(&trace, &body).await.unwrap();
        assert_eq!(stock(&r, "p1"), Some(4));
    }

    #[tokio::test]
    async fn stock_may_go_negative() {
        let r = reconciler(&[("p1", 1)]);
        r.handle(&TraceContext::new_root(), &payload("order.created", &[("p1", 5)]))
            .await
            .unwrap();
        assert_eq!(stock(&r, "p1"), Some(-4));
    }

    #[tokio::test]
    async fn unparseable_payload_is_malformed() {
        let r = reconciler(&[("p1", 1)]);
        let err = r.handle(&TraceContext::new_root(), "{not json").await.unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedEvent(_)));

        let err = r
            .handle(&TraceContext::new_root(), r#"{"type":"order.created","orderId":"o-1"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::MalformedEvent(_)));
    }

    #[tokio::test]
    async fn returned_type_is_unsupported_and_changes_nothing() {
        let r = reconciler(&[("p1", 5)]);
        let err = r
            .handle(&TraceContext::new_root(), &payload("order.returned", &[("p1", 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::UnsupportedEventType(t) if t == "order.returned"));
        assert_eq!(stock(&r, "p1"), Some(5));
    }

    #[tokio::test]
    async fn later_item_failure_keeps_earlier_adjustments() {
        let r = reconciler(&[("p1", 10), ("p3", 10)]);
        let err = r
            .handle(
                &TraceContext::new_root(),
                &payload("order.created", &[("p1", 2), ("ghost", 1), ("p3", 4)]),
            )
            .await
            .unwrap_err();

        match err {
            ReconcileError::Store { product_id, applied, source } => {
                assert_eq!(product_id, ProductId::new("ghost"));
                assert_eq!(applied, 1);
                assert!(matches!(source, StoreError::NotFound(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock(&r, "p1"), Some(8));
        assert_eq!(stock(&r, "p3"), Some(10));
    }
}
