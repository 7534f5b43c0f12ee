use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use stockflow_core::{DomainError, DomainResult, OrderId, ProductId};
use stockflow_events::{EventItem, LifecycleEvent, LifecycleEventType};

/// Order status.
///
/// Statuses are caller-defined free text; only `created`, `delivered`,
/// `canceled` and `returned` carry engine semantics. Anything else is kept
/// verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OrderStatus {
    Created,
    Delivered,
    Canceled,
    Returned,
    Other(String),
}

impl OrderStatus {
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Returned => "returned",
            OrderStatus::Other(s) => s,
        }
    }

    /// Parse a status value. Blank values are rejected.
    pub fn parse(value: &str) -> DomainResult<Self> {
        let status = match value {
            "created" => OrderStatus::Created,
            "delivered" => OrderStatus::Delivered,
            "canceled" => OrderStatus::Canceled,
            "returned" => OrderStatus::Returned,
            other if other.trim().is_empty() => {
                return Err(DomainError::validation("status must not be empty"));
            }
            other => OrderStatus::Other(other.to_string()),
        };
        Ok(status)
    }

    /// Sink states: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Returned)
    }

    /// State machine:
    ///
    /// | current               | allowed next    |
    /// |-----------------------|-----------------|
    /// | canceled, returned    | none            |
    /// | delivered             | returned only   |
    /// | anything else         | anything        |
    pub fn can_transition_to(&self, next: &OrderStatus) -> bool {
        match self {
            OrderStatus::Canceled | OrderStatus::Returned => false,
            OrderStatus::Delivered => matches!(next, OrderStatus::Returned),
            OrderStatus::Created | OrderStatus::Other(_) => true,
        }
    }

    /// Entering this status restocks inventory downstream.
    pub fn emits_cancellation(&self) -> bool {
        matches!(self, OrderStatus::Canceled | OrderStatus::Returned)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for OrderStatus {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        OrderStatus::parse(&value)
    }
}

impl From<OrderStatus> for String {
    fn from(value: OrderStatus) -> Self {
        match value {
            OrderStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

/// Order line: product and quantity. Value type owned by its order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: u32,
}

impl OrderItem {
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            product_id,
            product_name: None,
            quantity,
        }
    }

    pub fn named(mut self, product_name: impl Into<String>) -> Self {
        self.product_name = Some(product_name.into());
        self
    }
}

impl From<&OrderItem> for EventItem {
    fn from(item: &OrderItem) -> Self {
        EventItem {
            product_id: item.product_id.clone(),
            product_name: item.product_name.clone(),
            quantity: item.quantity,
        }
    }
}

/// Partial update accepted by the order authority. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OrderPatch {
    #[serde(default)]
    pub status: Option<OrderStatus>,
}

/// Order record.
///
/// Items are fixed at creation. Deletion is soft: `deleted` is set and the
/// record stays addressable by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    id: OrderId,
    status: OrderStatus,
    created_at: String,
    items: Vec<OrderItem>,
    #[serde(default)]
    deleted: bool,
}

impl Order {
    /// Build a new order in status `created`.
    pub fn create(id: OrderId, items: Vec<OrderItem>, now: DateTime<Utc>) -> DomainResult<Self> {
        if items.is_empty() {
            return Err(DomainError::validation("order must have at least one item"));
        }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(DomainError::validation(format!(
                "quantity must be positive (product {})",
                item.product_id
            )));
        }

        Ok(Self {
            id,
            status: OrderStatus::Created,
            created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            items,
            deleted: false,
        })
    }

    /// Rebuild a record read back from storage (no validation).
    pub fn restore(
        id: OrderId,
        status: OrderStatus,
        created_at: impl Into<String>,
        items: Vec<OrderItem>,
        deleted: bool,
    ) -> Self {
        Self {
            id,
            status,
            created_at: created_at.into(),
            items,
            deleted,
        }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn status(&self) -> &OrderStatus {
        &self.status
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Soft-deleted orders accept no further changes.
    pub fn ensure_modifiable(&self) -> DomainResult<()> {
        if self.deleted {
            return Err(DomainError::invalid_operation("cannot modify a deleted order"));
        }
        Ok(())
    }

    /// Move to `next` if the state machine allows it; otherwise leave the order untouched.
    pub fn transition_to(&mut self, next: OrderStatus) -> DomainResult<()> {
        if !self.status.can_transition_to(&next) {
            return Err(DomainError::invalid_transition(self.status.as_str(), next.as_str()));
        }
        self.status = next;
        Ok(())
    }

    /// Deleting from a non-final status cancels the order first.
    pub fn requires_cancellation_before_delete(&self) -> bool {
        !matches!(
            self.status,
            OrderStatus::Delivered | OrderStatus::Canceled | OrderStatus::Returned
        )
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }

    /// Build the wire event for this order, carrying its current items.
    pub fn lifecycle_event(&self, event_type: LifecycleEventType) -> LifecycleEvent {
        LifecycleEvent::new(
            event_type,
            self.id.clone(),
            self.items.iter().map(EventItem::from).collect(),
            self.created_at.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_items() -> Vec<OrderItem> {
        vec![OrderItem::new(ProductId::new("p1"), 3).named("Widget")]
    }

    fn order_with_status(status: OrderStatus) -> Order {
        Order::restore(OrderId::new(), status, "2024-05-01T10:00:00Z", test_items(), false)
    }

    #[test]
    fn create_sets_initial_state() {
        let now = Utc::now();
        let order = Order::create(OrderId::new(), test_items(), now).unwrap();

        assert_eq!(order.status(), &OrderStatus::Created);
        assert!(!order.is_deleted());
        assert_eq!(order.items(), test_items().as_slice());
        assert_eq!(
            order.created_at(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true)
        );
        assert!(order.created_at().ends_with('Z'));
    }

    #[test]
    fn create_rejects_empty_items() {
        let err = Order::create(OrderId::new(), vec![], Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn create_rejects_zero_quantity() {
        let items = vec![OrderItem::new(ProductId::new("p1"), 0)];
        let err = Order::create(OrderId::new(), items, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("p1")));
    }

    #[test]
    fn delivered_order_can_only_be_returned() {
        let mut order = order_with_status(OrderStatus::Delivered);
        let err = order.transition_to(OrderStatus::Canceled).unwrap_err();
        assert_eq!(err, DomainError::invalid_transition("delivered", "canceled"));
        assert_eq!(order.status(), &OrderStatus::Delivered);

        order.transition_to(OrderStatus::Returned).unwrap();
        assert_eq!(order.status(), &OrderStatus::Returned);
    }

    #[test]
    fn deleted_order_is_not_modifiable() {
        let mut order = order_with_status(OrderStatus::Created);
        order.ensure_modifiable().unwrap();
        order.mark_deleted();
        assert!(matches!(
            order.ensure_modifiable(),
            Err(DomainError::InvalidOperation(_))
        ));
    }

    #[test]
    fn cancellation_before_delete_depends_on_status() {
        assert!(order_with_status(OrderStatus::Created).requires_cancellation_before_delete());
        assert!(
            order_with_status(OrderStatus::Other("packing".into()))
                .requires_cancellation_before_delete()
        );
        for status in [OrderStatus::Delivered, OrderStatus::Canceled, OrderStatus::Returned] {
            assert!(!order_with_status(status).requires_cancellation_before_delete());
        }
    }

    #[test]
    fn lifecycle_event_carries_items_and_created_at() {
        let order = order_with_status(OrderStatus::Canceled);
        let ev = order.lifecycle_event(LifecycleEventType::OrderCanceled);

        assert_eq!(ev.event_type, LifecycleEventType::OrderCanceled);
        assert_eq!(&ev.order_id, order.id());
        assert_eq!(ev.datetime, "2024-05-01T10:00:00Z");
        assert_eq!(ev.items.len(), 1);
        assert_eq!(ev.items[0].quantity, 3);
        assert_eq!(ev.items[0].product_name.as_deref(), Some("Widget"));
    }

    #[test]
    fn order_serializes_with_persisted_field_names() {
        let order = order_with_status(OrderStatus::Other("packing".into()));
        let value = serde_json::to_value(&order).unwrap();

        assert_eq!(value["status"], "packing");
        assert_eq!(value["createdAt"], "2024-05-01T10:00:00Z");
        assert_eq!(value["deleted"], false);
        assert_eq!(value["items"][0]["productId"], "p1");
        assert_eq!(value["items"][0]["productName"], "Widget");

        let back: Order = serde_json::from_value(value).unwrap();
        assert_eq!(back, order);
    }

    #[test]
    fn patch_parses_status_and_ignores_other_fields() {
        let patch: OrderPatch =
            serde_json::from_str(r#"{"status":"delivered","note":"x"}"#).unwrap();
        assert_eq!(patch.status, Some(OrderStatus::Delivered));

        let empty: OrderPatch = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.status, None);

        assert!(serde_json::from_str::<OrderPatch>(r#"{"status":""}"#).is_err());
    }

    fn free_form_status() -> impl Strategy<Value = OrderStatus> {
        "[a-z_]{1,12}".prop_map(|s| OrderStatus::parse(&s).unwrap())
    }

    fn any_status() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::Created),
            Just(OrderStatus::Delivered),
            Just(OrderStatus::Canceled),
            Just(OrderStatus::Returned),
            free_form_status(),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: from `created` or any non-special free-form status, every target is allowed.
        #[test]
        fn permissive_statuses_accept_any_target(
            current in free_form_status().prop_filter("non-special", |s| {
                !matches!(s, OrderStatus::Delivered | OrderStatus::Canceled | OrderStatus::Returned)
            }),
            target in any_status(),
        ) {
            let mut order = order_with_status(current);
            prop_assert!(order.transition_to(target.clone()).is_ok());
            prop_assert_eq!(order.status(), &target);
        }

        /// Property: canceled and returned are sinks.
        #[test]
        fn terminal_statuses_reject_every_target(
            terminal in prop_oneof![Just(OrderStatus::Canceled), Just(OrderStatus::Returned)],
            target in any_status(),
        ) {
            let mut order = order_with_status(terminal.clone());
            let is_invalid_transition = matches!(
                order.transition_to(target),
                Err(DomainError::InvalidTransition { .. })
            );
            prop_assert!(is_invalid_transition);
            prop_assert_eq!(order.status(), &terminal);
        }

        /// Property: delivered only moves to returned.
        #[test]
        fn delivered_accepts_only_returned(target in any_status()) {
            let mut order = order_with_status(OrderStatus::Delivered);
            let result = order.transition_to(target.clone());
            if target == OrderStatus::Returned {
                prop_assert!(result.is_ok());
            } else {
                prop_assert!(result.is_err());
                prop_assert_eq!(order.status(), &OrderStatus::Delivered);
            }
        }
    }
}
