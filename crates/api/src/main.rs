use std::sync::Arc;

use anyhow::Context;

use stockflow_api::app::{build_app, services};
use stockflow_infra::config::OrderServiceConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockflow_observability::init();

    let config = OrderServiceConfig::from_env().context("invalid order service configuration")?;
    let services = Arc::new(services::build_services(&config).await?);
    let app = build_app(services);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
