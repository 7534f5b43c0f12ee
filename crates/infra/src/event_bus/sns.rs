use async_trait::async_trait;
use aws_sdk_sns::Client;
use aws_sdk_sns::error::DisplayErrorContext;
use aws_sdk_sns::types::MessageAttributeValue;
use tracing::{debug, instrument};

use stockflow_core::TraceContext;
use stockflow_events::{EventPublisher, LifecycleEvent, PublishError, TRACEPARENT_ATTRIBUTE};

/// Publishes lifecycle events to an SNS topic, one attempt per call.
///
/// The event JSON is the message body; the correlation token travels as the
/// `traceparent` string attribute.
#[derive(Debug, Clone)]
pub struct SnsEventPublisher {
    client: Client,
    topic_arn: String,
}

impl SnsEventPublisher {
    pub fn new(client: Client, topic_arn: impl Into<String>) -> Self {
        Self {
            client,
            topic_arn: topic_arn.into(),
        }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self::new(Client::new(config), topic_arn)
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }
}

#[async_trait]
impl EventPublisher for SnsEventPublisher {
    #[instrument(
        skip(self, trace, event),
        fields(
            topic_arn = %self.topic_arn,
            order_id = %event.order_id,
            event_type = %event.event_type,
            trace_id = %trace.trace_id()
        ),
        err
    )]
    async fn publish(&self, trace: &TraceContext, event: &LifecycleEvent) -> Result<(), PublishError> {
        let body = event.to_json()?;
        let traceparent = MessageAttributeValue::builder()
            .data_type("String")
            .string_value(trace.to_traceparent())
            .build()
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        let output = self
            .client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(body)
            .message_attributes(TRACEPARENT_ATTRIBUTE, traceparent)
            .send()
            .await
            .map_err(|e| PublishError::Transport(DisplayErrorContext(&e).to_string()))?;

        debug!(message_id = output.message_id().unwrap_or_default(), "event published");
        Ok(())
    }
}
