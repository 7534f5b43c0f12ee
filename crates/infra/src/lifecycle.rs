//! Order lifecycle orchestration.
//!
//! `OrderLifecycleEngine` composes an `OrderStore` and an `EventPublisher`:
//!
//! ```text
//! request
//!   ↓
//! 1. Load the current record (get / scan)
//!   ↓
//! 2. Decide (Order state machine, pure)
//!   ↓
//! 3. Persist (put)
//!   ↓
//! 4. Publish the lifecycle event, if the change emits one
//! ```
//!
//! Publication happens strictly after persistence and is attempted exactly once.
//! A publish failure never rolls the stored state back; it surfaces as
//! `LifecycleError::PartialFailure`, carrying the committed order.

use chrono::Utc;
use thiserror::Error;
use tracing::{info, instrument, warn};

use stockflow_core::{DomainError, OrderId, TraceContext};
use stockflow_events::{EventPublisher, LifecycleEventType, PublishError};
use stockflow_orders::{Order, OrderItem, OrderPatch, OrderStatus};

use crate::store::{OrderStore, StoreError};

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Validation, not-found, invalid transition or invalid operation. Nothing changed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("order store failure: {0}")]
    Store(#[from] StoreError),

    /// State is committed but the lifecycle event was not delivered to the channel.
    #[error("order {} was saved but its event could not be published: {source}", .order.id())]
    PartialFailure {
        order: Box<Order>,
        source: PublishError,
    },
}

impl LifecycleError {
    /// The committed order, when the failure happened after persistence.
    pub fn committed_order(&self) -> Option<&Order> {
        match self {
            LifecycleError::PartialFailure { order, .. } => Some(order),
            _ => None,
        }
    }
}

/// Order state machine + soft delete + event emission over injected backends.
#[derive(Debug)]
pub struct OrderLifecycleEngine<S, P> {
    store: S,
    publisher: P,
}

impl<S, P> OrderLifecycleEngine<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self { store, publisher }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}

impl<S, P> OrderLifecycleEngine<S, P>
where
    S: OrderStore,
    P: EventPublisher,
{
    /// Create an order in status `created` and publish `order.created`.
    #[instrument(
        skip(self, trace, items),
        fields(trace_id = %trace.trace_id(), span_id = %trace.span_id(), items = items.len()),
        err
    )]
    pub async fn create(&self, trace: &TraceContext, items: Vec<OrderItem>) -> Result<Order, LifecycleError> {
        let order = Order::create(OrderId::new(), items, Utc::now())?;
        self.store.put(&order).await?;
        info!(order_id = %order.id(), "order created");

        self.publish(trace, &order, LifecycleEventType::OrderCreated).await?;
        Ok(order)
    }

    /// Direct lookup; soft-deleted orders are still returned.
    #[instrument(skip(self, trace), fields(trace_id = %trace.trace_id(), order_id = %id), err)]
    pub async fn get(&self, trace: &TraceContext, id: &OrderId) -> Result<Order, LifecycleError> {
        self.load(id).await
    }

    /// Every order that is not soft-deleted, in storage-scan order.
    #[instrument(skip(self, trace), fields(trace_id = %trace.trace_id()), err)]
    pub async fn list(&self, trace: &TraceContext) -> Result<Vec<Order>, LifecycleError> {
        let orders = self.store.scan().await?;
        Ok(orders.into_iter().filter(|o| !o.is_deleted()).collect())
    }

    /// Move an order to `status`, publishing `order.canceled` when the new
    /// status is `canceled` or `returned`.
    #[instrument(
        skip(self, trace),
        fields(trace_id = %trace.trace_id(), order_id = %id, to = %status),
        err
    )]
    pub async fn apply_status_patch(
        &self,
        trace: &TraceContext,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Order, LifecycleError> {
        let mut order = self.load(id).await?;
        order.ensure_modifiable()?;

        let from = order.status().clone();
        order.transition_to(status)?;
        self.store.put(&order).await?;
        info!(from = %from, to = %order.status(), "order status changed");

        if order.status().emits_cancellation() {
            self.publish(trace, &order, LifecycleEventType::OrderCanceled).await?;
        }
        Ok(order)
    }

    /// Apply a partial update. Only `status` is patchable; an empty patch
    /// returns the current order without persisting or publishing.
    pub async fn apply_patch(
        &self,
        trace: &TraceContext,
        id: &OrderId,
        patch: OrderPatch,
    ) -> Result<Order, LifecycleError> {
        match patch.status {
            Some(status) => self.apply_status_patch(trace, id, status).await,
            None => {
                let order = self.load(id).await?;
                order.ensure_modifiable()?;
                Ok(order)
            }
        }
    }

    /// Soft delete. A non-terminal order is first canceled (persisted and
    /// published); if that publication fails the order stays canceled and
    /// the delete flag is not set.
    #[instrument(skip(self, trace), fields(trace_id = %trace.trace_id(), order_id = %id), err)]
    pub async fn delete(&self, trace: &TraceContext, id: &OrderId) -> Result<(), LifecycleError> {
        let mut order = self.load(id).await?;

        if order.requires_cancellation_before_delete() {
            order.transition_to(OrderStatus::Canceled)?;
            self.store.put(&order).await?;
            info!(order_id = %order.id(), "order canceled before delete");
            self.publish(trace, &order, LifecycleEventType::OrderCanceled).await?;
        }

        order.mark_deleted();
        self.store.put(&order).await?;
        info!(order_id = %order.id(), "order soft-deleted");
        Ok(())
    }

    async fn load(&self, id: &OrderId) -> Result<Order, LifecycleError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| DomainError::not_found().into())
    }

    async fn publish(
        &self,
        trace: &TraceContext,
        order: &Order,
        event_type: LifecycleEventType,
    ) -> Result<(), LifecycleError> {
        let event = order.lifecycle_event(event_type);
        match self.publisher.publish(trace, &event).await {
            Ok(()) => Ok(()),
            Err(source) => {
                warn!(
                    order_id = %order.id(),
                    event_type = %event.event_type,
                    error = %source,
                    "lifecycle event not published; state change kept"
                );
                Err(LifecycleError::PartialFailure {
                    order: Box::new(order.clone()),
                    source,
                })
            }
        }
    }
}
