use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId, UserId};
use mercato_inventory::{BatchReceipt, WarehouseId};
use mercato_products::ProductId;

mercato_core::document_id!(
    /// Production order identifier.
    ProductionOrderId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Planned,
    Released,
    Completed,
    Cancelled,
}

/// Bill-of-materials line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity_per_unit: i64,
    /// `quantity_per_unit * order quantity`.
    pub required: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionOrder {
    pub id: ProductionOrderId,
    pub tenant_id: TenantId,
    pub number: String,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub components: Vec<Component>,
    pub status: ProductionStatus,
    #[serde(default)]
    pub planned_date: Option<NaiveDate>,
    #[serde(default)]
    pub output_batch: Option<BatchReceipt>,
    /// Cost of one finished unit, known once completed.
    #[serde(default)]
    pub unit_cost: Option<u64>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComponent {
    pub product_id: ProductId,
    /// Defaults to the order's warehouse.
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    pub quantity_per_unit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProductionOrder {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub components: Vec<NewComponent>,
    #[serde(default)]
    pub planned_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl ProductionOrder {
    pub fn plan(
        tenant_id: TenantId,
        id: ProductionOrderId,
        number: String,
        input: NewProductionOrder,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.quantity <= 0 {
            return Err(DomainError::validation("production quantity must be positive"));
        }
        if input.components.is_empty() {
            return Err(DomainError::validation("production order needs at least one component"));
        }

        let mut seen = HashSet::new();
        let mut components = Vec::with_capacity(input.components.len());
        for c in input.components {
            if c.product_id == input.product_id {
                return Err(DomainError::validation("a product cannot be its own component"));
            }
            if c.quantity_per_unit <= 0 {
                return Err(DomainError::validation("component quantity must be positive"));
            }
            let warehouse_id = c.warehouse_id.unwrap_or(input.warehouse_id);
            if !seen.insert((c.product_id, warehouse_id)) {
                return Err(DomainError::validation(format!(
                    "component {} listed twice",
                    c.product_id
                )));
            }
            let required = c
                .quantity_per_unit
                .checked_mul(input.quantity)
                .ok_or_else(|| DomainError::validation("component requirement overflow"))?;
            components.push(Component {
                product_id: c.product_id,
                warehouse_id,
                quantity_per_unit: c.quantity_per_unit,
                required,
            });
        }

        Ok(Self {
            id,
            tenant_id,
            number,
            product_id: input.product_id,
            warehouse_id: input.warehouse_id,
            quantity: input.quantity,
            components,
            status: ProductionStatus::Planned,
            planned_date: input.planned_date,
            output_batch: None,
            unit_cost: None,
            notes: input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by,
            created_at: now,
            updated_at: now,
            released_at: None,
            completed_at: None,
        })
    }

    fn ensure_status(&self, expected: ProductionStatus, action: &str) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::invariant(format!(
                "cannot {action} production order {} in status {:?}",
                self.number, self.status
            )));
        }
        Ok(())
    }

    /// Planned → released. Components are to be reserved and the output expected.
    pub fn release(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(ProductionStatus::Planned, "release")?;
        self.status = ProductionStatus::Released;
        self.released_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Released → completed, costing the output from what was consumed.
    pub fn complete(
        &mut self,
        output_batch: Option<BatchReceipt>,
        consumed_cost: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<u64> {
        self.ensure_status(ProductionStatus::Released, "complete")?;
        let unit_cost = self.output_unit_cost(consumed_cost);
        self.status = ProductionStatus::Completed;
        self.output_batch = output_batch;
        self.unit_cost = Some(unit_cost);
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(unit_cost)
    }

    /// Cancel. Returns the status the order was in, so the caller knows
    /// whether reservations and on-order must be unwound.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<ProductionStatus> {
        let previous = self.status;
        match previous {
            ProductionStatus::Planned | ProductionStatus::Released => {}
            _ => {
                return Err(DomainError::invariant(format!(
                    "cannot cancel production order {} in status {:?}",
                    self.number, previous
                )));
            }
        }
        self.status = ProductionStatus::Cancelled;
        self.updated_at = now;
        Ok(previous)
    }

    /// Total consumed cost spread over the finished quantity, rounded half-up.
    pub fn output_unit_cost(&self, consumed_cost: u64) -> u64 {
        let q = self.quantity.max(1) as u64;
        (consumed_cost + q / 2) / q
    }
}

impl Entity for ProductionOrder {
    type Id = ProductionOrderId;
    const COLLECTION: &'static str = "production_orders";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}
