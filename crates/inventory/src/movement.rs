//! Stock-movement audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DocumentId, DocumentKind, Entity, TenantId, UserId};
use mercato_products::ProductId;

use crate::allocation::BatchAllocation;
use crate::record::{InventoryRecord, StockChange};
use crate::warehouse::WarehouseId;

mercato_core::document_id!(
    /// Stock movement identifier.
    StockMovementId
);

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Receipt,
    Issue,
    Reservation,
    ReservationRelease,
    OnOrder,
    OnOrderCancel,
    Adjustment,
    ProductionConsume,
    ProductionOutput,
    PosSale,
}

impl MovementKind {
    /// Kinds that put stock on hand.
    pub fn is_inbound(self) -> bool {
        matches!(self, MovementKind::Receipt | MovementKind::ProductionOutput)
    }

    /// Kinds that take stock off hand.
    pub fn is_outbound(self) -> bool {
        matches!(
            self,
            MovementKind::Issue | MovementKind::ProductionConsume | MovementKind::PosSale
        )
    }
}

/// The business document that caused a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementReference {
    pub kind: DocumentKind,
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number: Option<String>,
}

impl MovementReference {
    pub fn new(kind: DocumentKind, id: DocumentId, number: impl Into<String>) -> Self {
        Self {
            kind,
            id,
            number: Some(number.into()),
        }
    }
}

/// Immutable record of one change to an inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: StockMovementId,
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub kind: MovementKind,
    /// Signed change of the counter `kind` affects.
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub batches: Vec<BatchAllocation>,
    #[serde(default)]
    pub unit_cost: Option<u64>,
    #[serde(default)]
    pub reference: Option<MovementReference>,
    #[serde(default)]
    pub reason: Option<String>,
    pub quantity_after: i64,
    pub committed_after: i64,
    pub on_order_after: i64,
    pub occurred_at: DateTime<Utc>,
    pub user_id: UserId,
}

impl StockMovement {
    /// Build the audit entry for `change`, snapshotting the row after it was applied.
    pub fn record(
        id: StockMovementId,
        after: &InventoryRecord,
        change: StockChange,
        reference: Option<MovementReference>,
        reason: Option<String>,
        user_id: UserId,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            tenant_id: after.tenant_id(),
            product_id: after.product_id(),
            warehouse_id: after.warehouse_id(),
            kind: change.kind,
            quantity: change.quantity,
            batches: change.batches,
            unit_cost: change.unit_cost,
            reference,
            reason,
            quantity_after: after.quantity(),
            committed_after: after.committed(),
            on_order_after: after.on_order(),
            occurred_at,
            user_id,
        }
    }
}

impl Entity for StockMovement {
    type Id = StockMovementId;
    const COLLECTION: &'static str = "stock_movements";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}
