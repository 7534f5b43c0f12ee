use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use stockflow_core::DomainError;
use stockflow_infra::lifecycle::LifecycleError;

pub fn lifecycle_error_to_response(err: LifecycleError) -> axum::response::Response {
    match err {
        LifecycleError::Domain(DomainError::Validation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        LifecycleError::Domain(DomainError::NotFound) => {
            json_error(StatusCode::NOT_FOUND, "not_found", "order not found")
        }
        LifecycleError::Domain(e @ DomainError::InvalidTransition { .. }) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_transition", e.to_string())
        }
        LifecycleError::Domain(DomainError::InvalidOperation(msg)) => {
            json_error(StatusCode::BAD_REQUEST, "invalid_operation", msg)
        }
        LifecycleError::Store(e) => {
            error!(error = %e, "order store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
        LifecycleError::PartialFailure { order, source } => (
            StatusCode::BAD_GATEWAY,
            axum::Json(json!({
                "error": "publish_error",
                "message": format!("order saved but event could not be published: {source}"),
                "order": order,
            })),
        )
            .into_response(),
    }
}

pub fn json_rejection_to_response(rejection: JsonRejection) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_body", rejection.body_text())
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
