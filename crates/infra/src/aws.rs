//! Shared AWS SDK configuration.

use aws_config::{BehaviorVersion, Region, SdkConfig};
use tracing::info;

use crate::config::AwsSettings;

/// Load SDK configuration from the default provider chain, pinned to the
/// configured region and endpoint override.
pub async fn load_sdk_config(settings: &AwsSettings) -> SdkConfig {
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(settings.region.clone()));
    if let Some(endpoint) = &settings.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let config = loader.load().await;
    info!(
        region = %settings.region,
        endpoint = settings.endpoint_url.as_deref().unwrap_or("default"),
        "aws sdk configured"
    );
    config
}
