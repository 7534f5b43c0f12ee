//! Environment-driven configuration for both processes.
//!
//! Values are read through a lookup function so tests can supply a map instead
//! of mutating the process environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::workers::IngestionConfig;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_ORDERS_TABLE: &str = "orders";
pub const DEFAULT_PRODUCTS_TABLE: &str = "products";

const MAX_BATCH: usize = 10;
const MAX_WAIT_SECONDS: u64 = 20;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Region and optional endpoint override (LocalStack and friends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: String,
    pub endpoint_url: Option<String>,
}

impl AwsSettings {
    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Self {
        Self {
            region: non_empty(lookup, "AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            endpoint_url: non_empty(lookup, "AWS_ENDPOINT"),
        }
    }
}

/// Which backends the order service runs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderBackends {
    InMemory,
    Aws {
        orders_table: String,
        topic_arn: String,
        aws: AwsSettings,
    },
}

/// Order service (HTTP API) configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderServiceConfig {
    pub port: u16,
    pub backends: OrderBackends,
}

impl OrderServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;
        let use_aws = parse_bool(&lookup, "USE_AWS_BACKENDS")?;

        let backends = if use_aws {
            OrderBackends::Aws {
                orders_table: non_empty(&lookup, "ORDERS_TABLE").unwrap_or_else(|| DEFAULT_ORDERS_TABLE.to_string()),
                topic_arn: non_empty(&lookup, "ORDERS_TOPIC_ARN").ok_or(ConfigError::Missing("ORDERS_TOPIC_ARN"))?,
                aws: AwsSettings::from_lookup(&lookup),
            }
        } else {
            OrderBackends::InMemory
        };

        Ok(Self { port, backends })
    }
}

/// Inventory reconciler (queue worker) configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub queue_url: String,
    pub products_table: String,
    pub ingestion: IngestionConfig,
    pub aws: AwsSettings,
}

impl ReconcilerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let queue_url = non_empty(&lookup, "SQS_QUEUE_URL").ok_or(ConfigError::Missing("SQS_QUEUE_URL"))?;
        let products_table = non_empty(&lookup, "DYNAMODB_TABLE").unwrap_or_else(|| DEFAULT_PRODUCTS_TABLE.to_string());

        let defaults = IngestionConfig::default();
        let max_messages = parse_or(&lookup, "INGEST_MAX_MESSAGES", defaults.max_messages)?;
        if !(1..=MAX_BATCH).contains(&max_messages) {
            return Err(invalid("INGEST_MAX_MESSAGES", max_messages, format!("must be between 1 and {MAX_BATCH}")));
        }
        let wait_seconds = parse_or(&lookup, "INGEST_WAIT_SECONDS", defaults.wait_time.as_secs())?;
        if wait_seconds > MAX_WAIT_SECONDS {
            return Err(invalid("INGEST_WAIT_SECONDS", wait_seconds, format!("must be at most {MAX_WAIT_SECONDS}")));
        }
        let backoff_ms = parse_or(&lookup, "INGEST_ERROR_BACKOFF_MS", defaults.error_backoff.as_millis() as u64)?;

        Ok(Self {
            queue_url,
            products_table,
            ingestion: IngestionConfig {
                max_messages,
                wait_time: Duration::from_secs(wait_seconds),
                error_backoff: Duration::from_millis(backoff_ms),
            },
            aws: AwsSettings::from_lookup(&lookup),
        })
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup, name) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, name: &'static str) -> Result<bool, ConfigError> {
    match non_empty(lookup, name).map(|v| v.to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(name, &v, "expected a boolean".to_string())),
        },
    }
}

fn invalid(name: &'static str, value: impl ToString, reason: String) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason,
    }
}
