use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockflow_core::{OrderId, TraceContext};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/:id", get(get_order).patch(patch_order).delete(delete_order))
}

fn parse_order_id(id: &str) -> Result<OrderId, axum::response::Response> {
    id.parse()
        .map_err(|_| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid order id"))
}

pub async fn create_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(trace): Extension<TraceContext>,
    body: Result<Json<dto::CreateOrderRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(rejection) => return errors::json_rejection_to_response(rejection),
    };

    match services.orders.create(&trace, body.items).await {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(trace): Extension<TraceContext>,
) -> axum::response::Response {
    match services.orders.list(&trace).await {
        Ok(orders) => Json(orders).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(trace): Extension<TraceContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.get(&trace, &id).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn patch_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(trace): Extension<TraceContext>,
    Path(id): Path<String>,
    body: Bytes,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    // Existence and the deleted flag are checked before the body is parsed.
    let order = match services.orders.get(&trace, &id).await {
        Ok(order) => order,
        Err(e) => return errors::lifecycle_error_to_response(e),
    };
    if let Err(e) = order.ensure_modifiable() {
        return errors::lifecycle_error_to_response(e.into());
    }

    let request: dto::PatchOrderRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_body", e.to_string()),
    };
    let patch = match request.into_patch() {
        Ok(p) => p,
        Err(e) => return errors::lifecycle_error_to_response(e.into()),
    };

    match services.orders.apply_patch(&trace, &id, patch).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}

pub async fn delete_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(trace): Extension<TraceContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_order_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.orders.delete(&trace, &id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::lifecycle_error_to_response(e),
    }
}
