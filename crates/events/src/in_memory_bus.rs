//! In-memory notification channel and queue for tests/dev.
//!
//! - `InMemoryNotificationChannel` fans every published event out to all
//!   subscribed queues, wrapped in the same envelope a real channel delivers
//! - `InMemoryQueue` implements visibility-timeout semantics: received messages
//!   are hidden until acknowledged or until the timeout elapses, then redelivered

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use stockflow_core::TraceContext;

use crate::bus::{EventPublisher, PublishError};
use crate::envelope::NotificationEnvelope;
use crate::event::LifecycleEvent;
use crate::queue::{MessageQueue, QueueError, QueueMessage};

const DEFAULT_TOPIC_ARN: &str = "arn:stockflow:in-memory:orders";

/// In-memory fan-out channel.
#[derive(Debug)]
pub struct InMemoryNotificationChannel {
    topic_arn: String,
    subscribers: Mutex<Vec<Arc<InMemoryQueue>>>,
    published: Mutex<Vec<NotificationEnvelope>>,
}

impl InMemoryNotificationChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver every subsequent publication to `queue` as well.
    pub fn subscribe(&self, queue: Arc<InMemoryQueue>) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(queue);
        }
    }

    /// Every envelope published so far, in publication order.
    pub fn published(&self) -> Vec<NotificationEnvelope> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Decoded events published so far.
    pub fn published_events(&self) -> Vec<LifecycleEvent> {
        self.published()
            .iter()
            .filter_map(|env| LifecycleEvent::from_json(env.message()).ok())
            .collect()
    }
}

impl Default for InMemoryNotificationChannel {
    fn default() -> Self {
        Self {
            topic_arn: DEFAULT_TOPIC_ARN.to_string(),
            subscribers: Mutex::new(Vec::new()),
            published: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryNotificationChannel {
    async fn publish(&self, trace: &TraceContext, event: &LifecycleEvent) -> Result<(), PublishError> {
        let envelope = NotificationEnvelope::for_event(event, trace)?.with_delivery_metadata(
            Uuid::new_v4().to_string(),
            self.topic_arn.clone(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        );
        let body = envelope.to_json()?;

        let subscribers = self
            .subscribers
            .lock()
            .map_err(|_| PublishError::Transport("subscriber list poisoned".to_string()))?
            .clone();
        for queue in &subscribers {
            queue.send(body.clone());
        }

        self.published
            .lock()
            .map_err(|_| PublishError::Transport("publication log poisoned".to_string()))?
            .push(envelope);

        debug!(
            event_type = %event.event_type,
            order_id = %event.order_id,
            subscribers = subscribers.len(),
            "published to in-memory channel"
        );
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Pending {
    message_id: String,
    body: String,
    receive_count: u32,
}

#[derive(Debug)]
struct InFlight {
    message: Pending,
    visible_at: Instant,
}

#[derive(Debug, Default)]
struct QueueState {
    ready: VecDeque<Pending>,
    in_flight: HashMap<String, InFlight>,
    receipts: u64,
}

impl QueueState {
    fn requeue_expired(&mut self, now: Instant) {
        let expired: Vec<String> = self
            .in_flight
            .iter()
            .filter(|(_, f)| f.visible_at <= now)
            .map(|(receipt, _)| receipt.clone())
            .collect();

        for receipt in expired {
            if let Some(f) = self.in_flight.remove(&receipt) {
                self.ready.push_back(f.message);
            }
        }
    }

    fn next_expiry(&self) -> Option<Instant> {
        self.in_flight.values().map(|f| f.visible_at).min()
    }
}

/// In-memory visibility-timeout queue.
#[derive(Debug)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
    notify: Notify,
    visibility_timeout: Duration,
}

impl InMemoryQueue {
    pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::with_visibility_timeout(Self::DEFAULT_VISIBILITY_TIMEOUT)
    }

    pub fn with_visibility_timeout(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
            visibility_timeout,
        }
    }

    /// Enqueue a raw body; returns the assigned message id.
    pub fn send(&self, body: impl Into<String>) -> String {
        let message_id = Uuid::new_v4().to_string();
        if let Ok(mut state) = self.state.lock() {
            state.ready.push_back(Pending {
                message_id: message_id.clone(),
                body: body.into(),
                receive_count: 0,
            });
        }
        self.notify.notify_one();
        message_id
    }

    /// Messages currently visible to consumers.
    pub fn visible_len(&self) -> usize {
        self.state
            .lock()
            .map(|mut s| {
                s.requeue_expired(Instant::now());
                s.ready.len()
            })
            .unwrap_or(0)
    }

    /// Messages received but neither acknowledged nor expired.
    pub fn in_flight_len(&self) -> usize {
        self.state
            .lock()
            .map(|mut s| {
                s.requeue_expired(Instant::now());
                s.in_flight.len()
            })
            .unwrap_or(0)
    }

    /// Visible + in-flight.
    pub fn depth(&self) -> usize {
        self.state
            .lock()
            .map(|s| s.ready.len() + s.in_flight.len())
            .unwrap_or(0)
    }

    fn take_batch(&self, max_messages: usize) -> Result<(Vec<QueueMessage>, Option<Instant>), QueueError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| QueueError::Receive("queue state poisoned".to_string()))?;

        let now = Instant::now();
        state.requeue_expired(now);

        let mut batch = Vec::new();
        while batch.len() < max_messages {
            let Some(mut message) = state.ready.pop_front() else {
                break;
            };
            message.receive_count += 1;
            state.receipts += 1;
            let receipt_handle = format!("{}#{}", message.message_id, state.receipts);

            batch.push(QueueMessage {
                message_id: message.message_id.clone(),
                receipt_handle: receipt_handle.clone(),
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
            state.in_flight.insert(
                receipt_handle,
                InFlight {
                    message,
                    visible_at: now + self.visibility_timeout,
                },
            );
        }

        Ok((batch, state.next_expiry()))
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + wait;

        loop {
            let (batch, next_expiry) = self.take_batch(max_messages.max(1))?;
            if !batch.is_empty() {
                return Ok(batch);
            }
            if Instant::now() >= deadline {
                return Ok(batch);
            }

            // Wake on a send, on the next visibility expiry, or at the deadline.
            let wake_at = next_expiry.map_or(deadline, |at| at.min(deadline));
            let _ = tokio::time::timeout_at(wake_at, self.notify.notified()).await;
        }
    }

    async fn acknowledge(&self, message: &QueueMessage) -> Result<(), QueueError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| QueueError::Acknowledge("queue state poisoned".to_string()))?;

        state
            .in_flight
            .remove(&message.receipt_handle)
            .map(|_| ())
            .ok_or_else(|| QueueError::UnknownReceipt(message.receipt_handle.clone()))
    }
}
