//! In-transaction view of inventory rows touched by one workflow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use mercato_core::{DomainError, UserId};
use mercato_inventory::{
    InventoryKey, InventoryRecord, MovementReference, StockChange, StockMovement, StockMovementId,
    Warehouse, WarehouseId,
};
use mercato_products::{Product, ProductId};

use crate::store::{StoreTx, typed};

use super::WorkflowResult;

struct LoadedRow {
    /// Version read from the store, `None` for a row created here.
    version: Option<u64>,
    record: InventoryRecord,
    dirty: bool,
}

/// Collects inventory changes and their audit movements for one transaction.
///
/// Rows are loaded once (find-or-create), mutated in memory by the pure
/// inventory operations and written back by [`StockLedger::flush`] with the
/// version they were read at.
pub struct StockLedger {
    user_id: UserId,
    now: DateTime<Utc>,
    rows: HashMap<InventoryKey, LoadedRow>,
    touched: Vec<InventoryKey>,
    products: HashMap<ProductId, Product>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    movements: Vec<StockMovement>,
}

impl StockLedger {
    pub fn new(user_id: UserId, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            now,
            rows: HashMap::new(),
            touched: Vec::new(),
            products: HashMap::new(),
            warehouses: HashMap::new(),
            movements: Vec::new(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Load a product (cached for the rest of the transaction).
    pub async fn product(&mut self, tx: &mut dyn StoreTx, id: ProductId) -> WorkflowResult<Product> {
        if let Some(p) = self.products.get(&id) {
            return Ok(p.clone());
        }
        let product = typed::load::<Product>(tx, &id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("product {id}")))?
            .value;
        self.products.insert(id, product.clone());
        Ok(product)
    }

    pub async fn warehouse(&mut self, tx: &mut dyn StoreTx, id: WarehouseId) -> WorkflowResult<Warehouse> {
        if let Some(w) = self.warehouses.get(&id) {
            return Ok(w.clone());
        }
        let warehouse = typed::load::<Warehouse>(tx, &id.to_string())
            .await?
            .ok_or_else(|| DomainError::not_found(format!("warehouse {id}")))?
            .value;
        self.warehouses.insert(id, warehouse.clone());
        Ok(warehouse)
    }

    async fn ensure_row(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> WorkflowResult<InventoryKey> {
        let key = InventoryKey {
            product_id,
            warehouse_id,
        };
        if self.rows.contains_key(&key) {
            return Ok(key);
        }
        let loaded = match typed::load::<InventoryRecord>(tx, &key.to_string()).await? {
            Some(v) => LoadedRow {
                version: Some(v.version),
                record: v.value,
                dirty: false,
            },
            None => {
                self.warehouse(tx, warehouse_id).await?;
                LoadedRow {
                    version: None,
                    record: InventoryRecord::empty(tx.tenant_id(), product_id, warehouse_id, self.now),
                    dirty: false,
                }
            }
        };
        self.rows.insert(key, loaded);
        Ok(key)
    }

    /// Current state of a row as seen by this transaction.
    pub async fn row(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> WorkflowResult<InventoryRecord> {
        let key = self.ensure_row(tx, product_id, warehouse_id).await?;
        self.rows
            .get(&key)
            .map(|r| r.record.clone())
            .ok_or_else(|| DomainError::invariant("inventory row vanished").into())
    }

    /// Run one stock operation against a row and record its movement.
    ///
    /// `op` receives the row and the product master (for batch management).
    pub async fn apply<F>(
        &mut self,
        tx: &mut dyn StoreTx,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        reference: Option<&MovementReference>,
        reason: Option<&str>,
        op: F,
    ) -> WorkflowResult<StockChange>
    where
        F: FnOnce(&mut InventoryRecord, &Product) -> Result<StockChange, DomainError>,
    {
        let product = self.product(tx, product_id).await?;
        let key = self.ensure_row(tx, product_id, warehouse_id).await?;
        let row = self
            .rows
            .get_mut(&key)
            .ok_or_else(|| DomainError::invariant("inventory row vanished"))?;

        let change = op(&mut row.record, &product)?;
        row.record.check_invariants()?;
        if !row.dirty {
            row.dirty = true;
            self.touched.push(key);
        }

        self.movements.push(StockMovement::record(
            StockMovementId::new(),
            &row.record,
            change.clone(),
            reference.cloned(),
            reason.map(str::to_string),
            self.user_id,
            self.now,
        ));
        Ok(change)
    }

    /// Stage every touched row and the movements. Returns the movements.
    pub async fn flush(self, tx: &mut dyn StoreTx) -> WorkflowResult<Vec<StockMovement>> {
        let mut rows = self.rows;
        for key in &self.touched {
            if let Some(row) = rows.remove(key) {
                match row.version {
                    Some(v) => typed::save(tx, &row.record, v).await?,
                    None => typed::insert(tx, &row.record).await?,
                };
            }
        }
        for movement in &self.movements {
            typed::insert(tx, movement).await?;
        }
        Ok(self.movements)
    }
}
