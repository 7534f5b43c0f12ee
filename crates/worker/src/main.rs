//! Inventory reconciler process: SQS → stock reconciler → DynamoDB.

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use stockflow_infra::aws::load_sdk_config;
use stockflow_infra::config::ReconcilerConfig;
use stockflow_infra::event_bus::SqsMessageQueue;
use stockflow_infra::reconciler::StockReconciler;
use stockflow_infra::store::DynamoInventoryStore;
use stockflow_infra::workers::IngestionWorker;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init();

    let config = ReconcilerConfig::from_env().context("invalid reconciler configuration")?;
    let sdk_config = load_sdk_config(&config.aws).await;

    let queue = SqsMessageQueue::from_sdk_config(&sdk_config, &config.queue_url);
    let reconciler = StockReconciler::new(DynamoInventoryStore::from_sdk_config(&sdk_config, &config.products_table));

    let shutdown = CancellationToken::new();
    let handle = IngestionWorker::new("stock-reconciler", queue, reconciler, config.ingestion)
        .with_cancellation(shutdown.clone())
        .spawn();

    tracing::info!(
        queue_url = %config.queue_url,
        table = %config.products_table,
        "stock reconciler running"
    );

    tokio::signal::ctrl_c().await.context("failed to listen for shutdown signal")?;
    tracing::info!("shutdown requested; finishing in-flight batch");
    handle.shutdown().await;

    Ok(())
}
