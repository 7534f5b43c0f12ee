use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use stockflow_core::TraceContext;
use stockflow_events::{MessageQueue, NotificationEnvelope, QueueError, QueueMessage};

/// Consumer of the inner payload of a notification envelope.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn handle(&self, trace: &TraceContext, payload: &str) -> Result<(), Self::Error>;
}

#[async_trait]
impl<H> MessageHandler for Arc<H>
where
    H: MessageHandler + ?Sized,
{
    type Error = H::Error;

    async fn handle(&self, trace: &TraceContext, payload: &str) -> Result<(), Self::Error> {
        (**self).handle(trace, payload).await
    }
}

/// Polling parameters for one ingestion loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionConfig {
    /// Upper bound on messages per receive call.
    pub max_messages: usize,
    /// Long-poll wait per receive call.
    pub wait_time: Duration,
    /// Pause after a failed receive before polling again.
    pub error_backoff: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            wait_time: Duration::from_secs(10),
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// What happened to one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Acknowledged,
    /// Body is not a notification envelope; left for redelivery.
    Malformed,
    /// Handler failed; left for redelivery.
    HandlerFailed,
    /// Handler succeeded but the delete failed; the message will be redelivered.
    AcknowledgeFailed,
}

/// Per-batch tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub received: usize,
    pub acknowledged: usize,
    pub failed: usize,
}

/// Handle to stop and join a spawned worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Token that stops the worker when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request graceful shutdown and wait for the in-flight batch to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        if let Some(join) = self.join.take() {
            if let Err(err) = join.await {
                error!(error = %err, "ingestion worker task ended abnormally");
            }
        }
    }
}

/// Long-polling queue consumer with acknowledge-on-success semantics.
///
/// - receive errors are logged, then the loop pauses for `error_backoff` and polls again
/// - each message is processed independently; a failure never blocks its siblings
/// - a message is deleted only after the handler succeeds, so failures are retried
///   by queue redelivery
/// - once the token is cancelled no new receive is issued; the current batch completes
#[derive(Debug)]
pub struct IngestionWorker<Q, H> {
    name: &'static str,
    queue: Q,
    handler: H,
    config: IngestionConfig,
    shutdown: CancellationToken,
}

impl<Q, H> IngestionWorker<Q, H>
where
    Q: MessageQueue + 'static,
    H: MessageHandler + 'static,
{
    pub fn new(name: &'static str, queue: Q, handler: H, config: IngestionConfig) -> Self {
        Self {
            name,
            queue,
            handler,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Stop this worker when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Run the loop on the tokio runtime.
    pub fn spawn(self) -> WorkerHandle {
        let shutdown = self.shutdown.clone();
        let join = tokio::spawn(self.run());
        WorkerHandle {
            shutdown,
            join: Some(join),
        }
    }

    /// Poll until cancelled.
    pub async fn run(self) {
        info!(worker = self.name, max_messages = self.config.max_messages, "ingestion worker started");

        loop {
            let received = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                res = self.queue.receive(self.config.max_messages, self.config.wait_time) => res,
            };

            match received {
                Ok(batch) => {
                    self.process_batch(batch).await;
                }
                Err(err) => {
                    error!(worker = self.name, error = %err, "queue receive failed");
                    tokio::select! {
                        biased;
                        _ = self.shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        info!(worker = self.name, "ingestion worker stopped");
    }

    /// One receive + process cycle.
    pub async fn poll_once(&self) -> Result<BatchReport, QueueError> {
        let batch = self
            .queue
            .receive(self.config.max_messages, self.config.wait_time)
            .await?;
        Ok(self.process_batch(batch).await)
    }

    async fn process_batch(&self, batch: Vec<QueueMessage>) -> BatchReport {
        let mut report = BatchReport {
            received: batch.len(),
            ..BatchReport::default()
        };
        for message in &batch {
            match self.process(message).await {
                MessageOutcome::Acknowledged => report.acknowledged += 1,
                _ => report.failed += 1,
            }
        }
        if report.received > 0 {
            debug!(
                worker = self.name,
                received = report.received,
                acknowledged = report.acknowledged,
                failed = report.failed,
                "batch processed"
            );
        }
        report
    }

    /// Unwrap, correlate, handle, acknowledge.
    pub async fn process(&self, message: &QueueMessage) -> MessageOutcome {
        let envelope = match NotificationEnvelope::from_json(&message.body) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(
                    worker = self.name,
                    message_id = %message.message_id,
                    error = %err,
                    "malformed notification envelope; leaving for redelivery"
                );
                return MessageOutcome::Malformed;
            }
        };

        let trace = match envelope.trace_context() {
            Some(parent) => parent.child(),
            None => {
                debug!(message_id = %message.message_id, "no usable traceparent; starting a new trace");
                TraceContext::new_root()
            }
        };

        let span = info_span!(
            "ingest_message",
            worker = self.name,
            message_id = %message.message_id,
            receive_count = message.receive_count,
            trace_id = %trace.trace_id(),
            span_id = %trace.span_id(),
        );

        async {
            if let Err(err) = self.handler.handle(&trace, envelope.message()).await {
                warn!(error = %err, "message handler failed; leaving for redelivery");
                return MessageOutcome::HandlerFailed;
            }

            match self.queue.acknowledge(message).await {
                Ok(()) => MessageOutcome::Acknowledged,
                Err(err) => {
                    warn!(error = %err, "failed to delete processed message");
                    MessageOutcome::AcknowledgeFailed
                }
            }
        }
        .instrument(span)
        .await
    }
}
