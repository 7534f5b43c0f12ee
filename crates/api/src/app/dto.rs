use serde::Deserialize;

use stockflow_core::DomainResult;
use stockflow_orders::{OrderItem, OrderPatch, OrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
}

/// `PATCH /orders/:id` body. `status` stays raw text until the order is loaded,
/// so an unknown id reports 404 before the body is judged.
#[derive(Debug, Default, Deserialize)]
pub struct PatchOrderRequest {
    #[serde(default)]
    pub status: Option<String>,
}

impl PatchOrderRequest {
    pub fn into_patch(self) -> DomainResult<OrderPatch> {
        let status = self.status.as_deref().map(OrderStatus::parse).transpose()?;
        Ok(OrderPatch { status })
    }
}
