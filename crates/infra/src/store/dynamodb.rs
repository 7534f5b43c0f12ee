//! DynamoDB-backed stores.
//!
//! Order table item: `id S, status S, createdAt S, deleted BOOL,
//! items L<M{productId S, productName S?, quantity N}>`.
//! Product table item: `id S, stock N` (other attributes are left alone).

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use tracing::instrument;

use stockflow_core::{OrderId, ProductId};
use stockflow_orders::{Order, OrderItem, OrderStatus};

use super::{InventoryStore, OrderStore, StoreError};

type Item = HashMap<String, AttributeValue>;

fn backend<E>(err: E) -> StoreError
where
    E: std::error::Error + 'static,
{
    StoreError::Backend(DisplayErrorContext(&err).to_string())
}

fn string_attr<'a>(item: &'a Item, name: &str) -> Result<&'a str, StoreError> {
    item.get(name)
        .and_then(|v| v.as_s().ok())
        .map(String::as_str)
        .ok_or_else(|| StoreError::Malformed(format!("missing string attribute {name}")))
}

fn order_to_item(order: &Order) -> Item {
    let items = order
        .items()
        .iter()
        .map(|line| {
            let mut m = HashMap::new();
            m.insert("productId".to_string(), AttributeValue::S(line.product_id.to_string()));
            if let Some(name) = &line.product_name {
                m.insert("productName".to_string(), AttributeValue::S(name.clone()));
            }
            m.insert("quantity".to_string(), AttributeValue::N(line.quantity.to_string()));
            AttributeValue::M(m)
        })
        .collect();

    HashMap::from([
        ("id".to_string(), AttributeValue::S(order.id().to_string())),
        ("status".to_string(), AttributeValue::S(order.status().to_string())),
        ("createdAt".to_string(), AttributeValue::S(order.created_at().to_string())),
        ("deleted".to_string(), AttributeValue::Bool(order.is_deleted())),
        ("items".to_string(), AttributeValue::L(items)),
    ])
}

fn order_item_from_attr(value: &AttributeValue) -> Result<OrderItem, StoreError> {
    let m = value
        .as_m()
        .map_err(|_| StoreError::Malformed("order item is not a map".to_string()))?;
    let quantity = m
        .get("quantity")
        .and_then(|v| v.as_n().ok())
        .and_then(|n| n.parse::<u32>().ok())
        .ok_or_else(|| StoreError::Malformed("order item quantity".to_string()))?;

    let mut line = OrderItem::new(ProductId::new(string_attr(m, "productId")?), quantity);
    if let Some(name) = m.get("productName").and_then(|v| v.as_s().ok()) {
        line = line.named(name.clone());
    }
    Ok(line)
}

fn order_from_item(item: &Item) -> Result<Order, StoreError> {
    let id: OrderId = string_attr(item, "id")?
        .parse()
        .map_err(|e| StoreError::Malformed(format!("order id: {e}")))?;
    let status = OrderStatus::parse(string_attr(item, "status")?)
        .map_err(|e| StoreError::Malformed(format!("order {id} status: {e}")))?;
    let items = match item.get("items") {
        Some(list) => list
            .as_l()
            .map_err(|_| StoreError::Malformed(format!("order {id} items is not a list")))?
            .iter()
            .map(order_item_from_attr)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let deleted = item
        .get("deleted")
        .and_then(|v| v.as_bool().ok())
        .copied()
        .unwrap_or(false);

    Ok(Order::restore(id, status, string_attr(item, "createdAt")?, items, deleted))
}

/// Orders table keyed by `id`.
#[derive(Debug, Clone)]
pub struct DynamoOrderStore {
    client: Client,
    table: String,
}

impl DynamoOrderStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig, table: impl Into<String>) -> Self {
        Self::new(Client::new(config), table)
    }
}

#[async_trait]
impl OrderStore for DynamoOrderStore {
    #[instrument(skip(self), fields(table = %self.table, order_id = %id), err)]
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let output = self
            .client
            .get_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(backend)?;

        output.item().map(order_from_item).transpose()
    }

    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn scan(&self) -> Result<Vec<Order>, StoreError> {
        let mut orders = Vec::new();
        let mut start_key: Option<Item> = None;

        loop {
            let output = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take())
                .send()
                .await
                .map_err(backend)?;

            for item in output.items() {
                orders.push(order_from_item(item)?);
            }

            match output.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        Ok(orders)
    }

    #[instrument(skip(self, order), fields(table = %self.table, order_id = %order.id()), err)]
    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(order_to_item(order)))
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }

    #[instrument(skip(self), fields(table = %self.table, order_id = %id), err)]
    async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
        self.client
            .delete_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(backend)?;
        Ok(())
    }
}

/// Products table keyed by `id`, holding a numeric `stock` attribute.
#[derive(Debug, Clone)]
pub struct DynamoInventoryStore {
    client: Client,
    table: String,
}

impl DynamoInventoryStore {
    pub fn new(client: Client, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig, table: impl Into<String>) -> Self {
        Self::new(Client::new(config), table)
    }
}

#[async_trait]
impl InventoryStore for DynamoInventoryStore {
    /// `SET stock = stock + :delta`, only for an existing product row.
    #[instrument(skip(self), fields(table = %self.table), err)]
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, StoreError> {
        let output = match self
            .client
            .update_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(product_id.to_string()))
            .update_expression("SET stock = stock + :delta")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":delta", AttributeValue::N(delta.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
        {
            Ok(output) => output,
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(|e| e.is_conditional_check_failed_exception()) =>
            {
                return Err(StoreError::NotFound(format!("product {product_id}")));
            }
            Err(err) => return Err(backend(err)),
        };

        output
            .attributes()
            .and_then(|attrs| attrs.get("stock"))
            .and_then(|v| v.as_n().ok())
            .and_then(|n| n.parse::<i64>().ok())
            .ok_or_else(|| StoreError::Malformed(format!("product {product_id} stock after update")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn order_item_mapping_survives_storage_shape() {
        let mut order = Order::create(
            "o-1".parse().unwrap(),
            vec![
                OrderItem::new(ProductId::new("p1"), 3).named("Widget"),
                OrderItem::new(ProductId::new("p2"), 1),
            ],
            Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap(),
        )
        .unwrap();
        order.transition_to(OrderStatus::Other("packed".into())).unwrap();
        order.mark_deleted();

        let item = order_to_item(&order);
        assert_eq!(item.get("createdAt"), Some(&AttributeValue::S("2024-05-01T10:00:00Z".into())));
        assert_eq!(item.get("deleted"), Some(&AttributeValue::Bool(true)));
        assert_eq!(order_from_item(&item).unwrap(), order);
    }

    #[test]
    fn records_without_deleted_flag_read_as_live() {
        let mut item = order_to_item(
            &Order::create(
                "o-2".parse().unwrap(),
                vec![OrderItem::new(ProductId::new("p1"), 1)],
                Utc::now(),
            )
            .unwrap(),
        );
        item.remove("deleted");
        assert!(!order_from_item(&item).unwrap().is_deleted());
    }

    #[test]
    fn missing_status_is_malformed() {
        let mut item = order_to_item(
            &Order::create(
                "o-3".parse().unwrap(),
                vec![OrderItem::new(ProductId::new("p1"), 1)],
                Utc::now(),
            )
            .unwrap(),
        );
        item.remove("status");
        assert!(matches!(order_from_item(&item), Err(StoreError::Malformed(_))));
    }
}
