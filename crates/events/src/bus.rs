//! Event publication abstraction (mechanics only).
//!
//! The order authority hands each lifecycle event to an `EventPublisher`, which
//! delivers it to a fan-out notification channel. Implementations exist per
//! backing technology (in-memory here, SNS in `stockflow-infra`) and are injected
//! at process start-up.
//!
//! ## Delivery contract
//!
//! - **Exactly one attempt** per call: publishers never retry internally.
//! - **Failures are synchronous**: a transport or serialization failure is returned
//!   to the caller, which decides how to report it. State changes that preceded the
//!   publish are never undone here.
//! - **Correlation**: the caller's `TraceContext` is attached to the outgoing
//!   message as the `traceparent` attribute.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use stockflow_core::TraceContext;

use crate::event::LifecycleEvent;

/// Publication failure.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialization(String),

    #[error("notification channel rejected the message: {0}")]
    Transport(String),
}

impl From<serde_json::Error> for PublishError {
    fn from(value: serde_json::Error) -> Self {
        PublishError::Serialization(value.to_string())
    }
}

/// Publishes lifecycle events to a notification channel.
///
/// The trait requires `Send + Sync` so one publisher can be shared across
/// request handlers.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, trace: &TraceContext, event: &LifecycleEvent) -> Result<(), PublishError>;
}

#[async_trait]
impl<P> EventPublisher for Arc<P>
where
    P: EventPublisher + ?Sized,
{
    async fn publish(&self, trace: &TraceContext, event: &LifecycleEvent) -> Result<(), PublishError> {
        (**self).publish(trace, event).await
    }
}
