//! Transport adapters for the lifecycle event flow.
//!
//! The publisher and queue abstractions live in `stockflow-events` together with
//! their in-memory implementations. This module provides the AWS-backed ones.

#[cfg(feature = "aws")]
pub mod sns;
#[cfg(feature = "aws")]
pub mod sqs;

#[cfg(feature = "aws")]
pub use sns::SnsEventPublisher;
#[cfg(feature = "aws")]
pub use sqs::SqsMessageQueue;
