//! Backend wiring for the order service.
//!
//! The lifecycle engine is built over trait objects so the store and publisher
//! can be chosen at start-up from configuration.

use std::sync::Arc;

use stockflow_events::{EventPublisher, InMemoryNotificationChannel};
use stockflow_infra::config::{OrderBackends, OrderServiceConfig};
use stockflow_infra::lifecycle::OrderLifecycleEngine;
use stockflow_infra::store::{InMemoryOrderStore, OrderStore};

pub type OrderEngine = OrderLifecycleEngine<Arc<dyn OrderStore>, Arc<dyn EventPublisher>>;

/// Shared state handed to every handler.
pub struct AppServices {
    pub orders: OrderEngine,
}

impl AppServices {
    pub fn new(store: Arc<dyn OrderStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            orders: OrderLifecycleEngine::new(store, publisher),
        }
    }

    /// In-memory store and notification channel (dev and tests).
    pub fn in_memory(channel: Arc<InMemoryNotificationChannel>) -> Self {
        Self::new(Arc::new(InMemoryOrderStore::new()), channel)
    }
}

/// Build services for the configured backends.
pub async fn build_services(config: &OrderServiceConfig) -> anyhow::Result<AppServices> {
    match &config.backends {
        OrderBackends::InMemory => {
            tracing::warn!("USE_AWS_BACKENDS not set; orders and events are kept in memory");
            Ok(AppServices::in_memory(Arc::new(InMemoryNotificationChannel::new())))
        }
        OrderBackends::Aws {
            orders_table,
            topic_arn,
            aws,
        } => build_aws_services(orders_table, topic_arn, aws).await,
    }
}

#[cfg(feature = "aws")]
async fn build_aws_services(
    orders_table: &str,
    topic_arn: &str,
    aws: &stockflow_infra::config::AwsSettings,
) -> anyhow::Result<AppServices> {
    use stockflow_infra::event_bus::SnsEventPublisher;
    use stockflow_infra::store::DynamoOrderStore;

    let sdk_config = stockflow_infra::aws::load_sdk_config(aws).await;
    let store = DynamoOrderStore::from_sdk_config(&sdk_config, orders_table);
    let publisher = SnsEventPublisher::from_sdk_config(&sdk_config, topic_arn);
    tracing::info!(table = orders_table, topic_arn, "using DynamoDB orders table and SNS topic");
    Ok(AppServices::new(Arc::new(store), Arc::new(publisher)))
}

#[cfg(not(feature = "aws"))]
async fn build_aws_services(
    _orders_table: &str,
    _topic_arn: &str,
    _aws: &stockflow_infra::config::AwsSettings,
) -> anyhow::Result<AppServices> {
    anyhow::bail!("USE_AWS_BACKENDS is set but this binary was built without the `aws` feature")
}
