use serde::{Deserialize, Serialize};

use stockflow_core::{OrderId, ProductId};

/// Wire event type.
///
/// Only `order.created` and `order.canceled` are produced. Returns are emitted as
/// `order.canceled` as well, so consumers cannot tell them apart. Any other value
/// read off the wire is kept verbatim in `Other` so the consumer can reject it by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LifecycleEventType {
    OrderCreated,
    OrderCanceled,
    Other(String),
}

impl LifecycleEventType {
    pub const ORDER_CREATED: &'static str = "order.created";
    pub const ORDER_CANCELED: &'static str = "order.canceled";

    pub fn as_str(&self) -> &str {
        match self {
            LifecycleEventType::OrderCreated => Self::ORDER_CREATED,
            LifecycleEventType::OrderCanceled => Self::ORDER_CANCELED,
            LifecycleEventType::Other(s) => s,
        }
    }
}

impl From<String> for LifecycleEventType {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::ORDER_CREATED => LifecycleEventType::OrderCreated,
            Self::ORDER_CANCELED => LifecycleEventType::OrderCanceled,
            _ => LifecycleEventType::Other(value),
        }
    }
}

impl From<LifecycleEventType> for String {
    fn from(value: LifecycleEventType) -> Self {
        match value {
            LifecycleEventType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for LifecycleEventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One order line as carried by an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventItem {
    pub product_id: ProductId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: u32,
}

/// Ephemeral lifecycle event (never persisted).
///
/// JSON shape: `{"type": "...", "orderId": "...", "items": [...], "datetime": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleEvent {
    #[serde(rename = "type")]
    pub event_type: LifecycleEventType,
    pub order_id: OrderId,
    pub items: Vec<EventItem>,
    pub datetime: String,
}

impl LifecycleEvent {
    pub fn new(
        event_type: LifecycleEventType,
        order_id: OrderId,
        items: Vec<EventItem>,
        datetime: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            order_id,
            items,
            datetime: datetime.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }
}
