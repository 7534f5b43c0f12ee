use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockflow_core::TraceContext;

use crate::event::LifecycleEvent;

/// Name of the message attribute carrying the correlation token.
pub const TRACEPARENT_ATTRIBUTE: &str = "traceparent";

/// Typed message attribute, as delivered by the notification channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageAttribute {
    #[serde(rename = "Type")]
    pub data_type: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl MessageAttribute {
    pub fn string(value: impl Into<String>) -> Self {
        Self {
            data_type: "String".to_string(),
            value: value.into(),
        }
    }
}

/// Envelope for a notification as it arrives in the queue.
///
/// The queue is fed by the fan-out channel, so a queue message body is this
/// envelope serialized as JSON, and `Message` is the serialized `LifecycleEvent`
/// (one extra layer of serialization relative to the raw event).
///
/// Notes:
/// - Only `Message` is required; delivery metadata is optional so hand-built
///   test bodies parse too.
/// - Attribute names are kept sorted for stable output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NotificationEnvelope {
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    notification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    topic_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,

    message: String,

    #[serde(default)]
    message_attributes: BTreeMap<String, MessageAttribute>,
}

impl NotificationEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            notification_type: None,
            message_id: None,
            topic_arn: None,
            timestamp: None,
            message: message.into(),
            message_attributes: BTreeMap::new(),
        }
    }

    /// Serialize `event` and attach the correlation token as `traceparent`.
    pub fn for_event(event: &LifecycleEvent, trace: &TraceContext) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event.to_json()?).with_attribute(
            TRACEPARENT_ATTRIBUTE,
            MessageAttribute::string(trace.to_traceparent()),
        ))
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attribute: MessageAttribute) -> Self {
        self.message_attributes.insert(name.into(), attribute);
        self
    }

    /// Stamp the metadata a channel adds on delivery.
    pub fn with_delivery_metadata(
        mut self,
        message_id: impl Into<String>,
        topic_arn: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        self.notification_type = Some("Notification".to_string());
        self.message_id = Some(message_id.into());
        self.topic_arn = Some(topic_arn.into());
        self.timestamp = Some(timestamp.into());
        self
    }

    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The inner (still serialized) event payload.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, MessageAttribute> {
        &self.message_attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&MessageAttribute> {
        self.message_attributes.get(name)
    }

    /// Raw correlation token, if one was attached.
    pub fn traceparent(&self) -> Option<&str> {
        self.attribute(TRACEPARENT_ATTRIBUTE)
            .map(|a| a.value.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Parsed correlation token (`None` when absent or malformed).
    pub fn trace_context(&self) -> Option<TraceContext> {
        self.traceparent().and_then(TraceContext::parse)
    }
}
