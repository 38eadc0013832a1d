//! Stock queries, manual adjustments and the movement history.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mercato_core::DomainError;
use mercato_inventory::{
    BatchReceipt, BatchRequest, InventoryKey, InventoryRecord, StockMovement, WarehouseId,
};
use mercato_products::ProductId;

use crate::store::{Filter, StoreTx, typed};

use super::{Actor, StockLedger, WorkflowResult, Workflows, finish, read};

/// Manual stock-count correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustRequest {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    /// Signed change of on-hand quantity.
    pub delta: i64,
    pub reason: String,
    #[serde(default)]
    pub unit_cost: Option<u64>,
    /// Batch receiving a positive correction.
    #[serde(default)]
    pub batch: Option<BatchReceipt>,
    /// Batches a negative correction is taken from (FEFO when empty).
    #[serde(default)]
    pub batches: Vec<BatchRequest>,
}

/// Optional product / warehouse narrowing for listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    #[serde(default, alias = "item_id")]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
}

impl StockQuery {
    fn filter(&self) -> Filter {
        let mut filter = Filter::all();
        if let Some(p) = self.product_id {
            filter = filter.eq("product_id", p);
        }
        if let Some(w) = self.warehouse_id {
            filter = filter.eq("warehouse_id", w);
        }
        filter
    }
}

/// Result of an adjustment: the row after the change and its movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub inventory: InventoryRecord,
    pub movement: StockMovement,
}

async fn load_row(
    tx: &mut dyn StoreTx,
    product_id: ProductId,
    warehouse_id: WarehouseId,
) -> WorkflowResult<InventoryRecord> {
    let key = InventoryKey {
        product_id,
        warehouse_id,
    };
    Ok(typed::load::<InventoryRecord>(tx, &key.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("inventory for {key}")))?
        .value)
}

impl Workflows {
    pub async fn get_inventory(
        &self,
        actor: &Actor,
        product_id: ProductId,
        warehouse_id: WarehouseId,
    ) -> WorkflowResult<InventoryRecord> {
        let mut tx = self.begin(actor).await?;
        let result = load_row(&mut *tx, product_id, warehouse_id).await;
        read(tx, result).await
    }

    pub async fn list_inventory(&self, actor: &Actor, query: StockQuery) -> WorkflowResult<Vec<InventoryRecord>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<InventoryRecord>(&mut *tx, &query.filter())
            .await
            .map(|v| v.into_iter().map(|r| r.value).collect())
            .map_err(Into::into);
        read(tx, result).await
    }

    pub async fn adjust_stock(&self, actor: &Actor, request: AdjustRequest) -> WorkflowResult<Adjustment> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            if request.reason.trim().is_empty() {
                return Err(DomainError::validation("an adjustment needs a reason").into());
            }
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            ledger.warehouse(&mut *tx, request.warehouse_id).await?;
            let AdjustRequest {
                product_id,
                warehouse_id,
                delta,
                reason,
                unit_cost,
                batch,
                batches,
            } = request;
            ledger
                .apply(&mut *tx, product_id, warehouse_id, None, Some(reason.trim()), |row, product| {
                    row.adjust(delta, unit_cost, batch, &batches, product.batch_managed, now)
                })
                .await?;
            let inventory = ledger.row(&mut *tx, product_id, warehouse_id).await?;
            let movement = ledger
                .flush(&mut *tx)
                .await?
                .pop()
                .ok_or_else(|| DomainError::invariant("adjustment recorded no movement"))?;
            Ok(Adjustment { inventory, movement })
        }
        .await;
        let adjustment = finish(tx, result, "inventory.adjust").await?;
        tracing::info!(
            tenant = %actor.tenant_id,
            product = %adjustment.inventory.product_id(),
            warehouse = %adjustment.inventory.warehouse_id(),
            delta = adjustment.movement.quantity,
            "stock adjusted"
        );
        Ok(adjustment)
    }

    /// Movements, oldest first.
    pub async fn list_movements(&self, actor: &Actor, query: StockQuery) -> WorkflowResult<Vec<StockMovement>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<StockMovement>(&mut *tx, &query.filter())
            .await
            .map(|v| {
                let mut movements: Vec<_> = v.into_iter().map(|m| m.value).collect();
                movements.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at).then(a.id.cmp(&b.id)));
                movements
            })
            .map_err(Into::into);
        read(tx, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::WorkflowError;
    use crate::workflows::testing::Fixture;
    use mercato_inventory::MovementKind;

    #[tokio::test]
    async fn adjustment_creates_row_and_movement() {
        let fx = Fixture::new();
        let p = fx.product("A-1", false, Some(500)).await;
        let w = fx.warehouse("MAIN").await;

        let adj = fx
            .wf
            .adjust_stock(
                &fx.actor,
                AdjustRequest {
                    product_id: p.id,
                    warehouse_id: w.id,
                    delta: 12,
                    reason: "opening count".into(),
                    unit_cost: Some(300),
                    batch: None,
                    batches: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(adj.inventory.quantity(), 12);
        assert_eq!(adj.inventory.average_cost(), 300);
        assert_eq!(adj.movement.kind, MovementKind::Adjustment);
        assert_eq!(adj.movement.quantity_after, 12);
        assert_eq!(adj.movement.reason.as_deref(), Some("opening count"));

        let rows = fx
            .wf
            .list_inventory(
                &fx.actor,
                StockQuery {
                    product_id: Some(p.id),
                    warehouse_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        let moves = fx.wf.list_movements(&fx.actor, StockQuery::default()).await.unwrap();
        assert_eq!(moves.len(), 1);
    }

    #[tokio::test]
    async fn negative_adjustment_cannot_go_below_committed() {
        let fx = Fixture::new();
        let p = fx.product("A-1", false, Some(500)).await;
        let w = fx.warehouse("MAIN").await;
        fx.stock(p.id, w.id, 5).await;

        let err = fx
            .wf
            .adjust_stock(
                &fx.actor,
                AdjustRequest {
                    product_id: p.id,
                    warehouse_id: w.id,
                    delta: -6,
                    reason: "shrinkage".into(),
                    unit_cost: None,
                    batch: None,
                    batches: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));
        assert_eq!(fx.row(p.id, w.id).await.quantity(), 5);
        assert_eq!(fx.wf.list_movements(&fx.actor, StockQuery::default()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn adjustment_in_unknown_warehouse_is_not_found() {
        let fx = Fixture::new();
        let p = fx.product("A-1", false, None).await;
        let err = fx
            .wf
            .adjust_stock(
                &fx.actor,
                AdjustRequest {
                    product_id: p.id,
                    warehouse_id: WarehouseId::new(),
                    delta: 1,
                    reason: "found".into(),
                    unit_cost: None,
                    batch: None,
                    batches: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let fx = Fixture::new();
        let p = fx.product("A-1", false, None).await;
        let w = fx.warehouse("MAIN").await;
        assert!(fx.wf.get_inventory(&fx.actor, p.id, w.id).await.is_err());
    }
}
