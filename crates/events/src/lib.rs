//! Order lifecycle events and the transport contract between the order
//! authority (producer) and the inventory reconciler (consumer).
//!
//! - `event`: the wire payload (`LifecycleEvent`)
//! - `envelope`: the notification envelope that carries the payload plus the
//!   `traceparent` attribute through the fan-out channel into the queue
//! - `bus` / `queue`: capability traits the core components depend on
//! - `in_memory_bus`: in-process channel + queue for tests/dev

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod queue;

pub use bus::{EventPublisher, PublishError};
pub use envelope::{MessageAttribute, NotificationEnvelope, TRACEPARENT_ATTRIBUTE};
pub use event::{EventItem, LifecycleEvent, LifecycleEventType};
pub use in_memory_bus::{InMemoryNotificationChannel, InMemoryQueue};
pub use queue::{MessageQueue, QueueError, QueueMessage};
