use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockflow_core::{OrderId, ProductId};
use stockflow_inventory::ProductStock;
use stockflow_orders::Order;

use super::{InventoryStore, OrderStore, StoreError};

fn poisoned() -> StoreError {
    StoreError::Backend("in-memory store lock poisoned".to_string())
}

#[derive(Debug, Default)]
struct OrderTable {
    rows: HashMap<OrderId, Order>,
    /// Insertion order, so `scan` is stable across calls.
    keys: Vec<OrderId>,
}

/// In-memory order table for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    inner: RwLock<OrderTable>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.read().map(|t| t.rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        let table = self.inner.read().map_err(|_| poisoned())?;
        Ok(table.rows.get(id).cloned())
    }

    async fn scan(&self) -> Result<Vec<Order>, StoreError> {
        let table = self.inner.read().map_err(|_| poisoned())?;
        Ok(table
            .keys
            .iter()
            .filter_map(|id| table.rows.get(id).cloned())
            .collect())
    }

    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| poisoned())?;
        if table.rows.insert(order.id().clone(), order.clone()).is_none() {
            table.keys.push(order.id().clone());
        }
        Ok(())
    }

    async fn delete(&self, id: &OrderId) -> Result<(), StoreError> {
        let mut table = self.inner.write().map_err(|_| poisoned())?;
        if table.rows.remove(id).is_some() {
            table.keys.retain(|k| k != id);
        }
        Ok(())
    }
}

/// In-memory product stock table for tests/dev.
///
/// Adjusting an unknown product fails with `NotFound` rather than creating a row.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    inner: RwLock<HashMap<ProductId, ProductStock>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed (or overwrite) a product row.
    pub fn insert_product(&self, product_id: ProductId, stock: i64) {
        if let Ok(mut map) = self.inner.write() {
            map.insert(product_id.clone(), ProductStock::new(product_id, stock));
        }
    }

    pub fn product(&self, product_id: &ProductId) -> Option<ProductStock> {
        self.inner.read().ok()?.get(product_id).cloned()
    }

    pub fn stock(&self, product_id: &ProductId) -> Option<i64> {
        self.inner.read().ok()?.get(product_id).map(|row| row.stock)
    }
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn adjust_stock(&self, product_id: &ProductId, delta: i64) -> Result<i64, StoreError> {
        let mut map = self.inner.write().map_err(|_| poisoned())?;
        let row = map
            .get_mut(product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {product_id}")))?;
        Ok(row.apply(delta))
    }
}
