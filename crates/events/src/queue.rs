//! Point-to-point queue abstraction consumed by the ingestion loop.
//!
//! Semantics follow a visibility-timeout queue:
//! - `receive` hands out up to `max_messages` and hides them from other consumers
//!   for the queue's visibility timeout
//! - `acknowledge` deletes a message for good
//! - a message that is not acknowledged before its timeout elapses becomes
//!   visible again (at-least-once delivery)

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// A message received from the queue (body still holds the notification envelope).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Handle identifying this particular receipt; required to acknowledge.
    pub receipt_handle: String,
    pub body: String,
    /// How many times the message has been handed out, including this one.
    pub receive_count: u32,
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("receive failed: {0}")]
    Receive(String),

    #[error("acknowledge failed: {0}")]
    Acknowledge(String),

    #[error("unknown or expired receipt handle: {0}")]
    UnknownReceipt(String),
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-poll for up to `max_messages`, waiting at most `wait` when the queue is empty.
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError>;

    /// Delete a processed message.
    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

#[async_trait]
impl<Q> MessageQueue for Arc<Q>
where
    Q: MessageQueue + ?Sized,
{
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(max_messages, wait).await
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        (**self).acknowledge(message).await
    }
}
