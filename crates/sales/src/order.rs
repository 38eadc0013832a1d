use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DocumentTotals, DomainError, DomainResult, Entity, LineAmounts, TenantId, UserId};
use mercato_inventory::{BatchAllocation, BatchRequest, WarehouseId};
use mercato_parties::PartyId;
use mercato_pricing::PriceSource;
use mercato_products::ProductId;

mercato_core::document_id!(
    /// Sales order identifier (tenant-scoped via the `tenant_id` field).
    SalesOrderId
);

/// Sales order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalesOrderStatus {
    Open,
    PartiallyDelivered,
    Delivered,
    Cancelled,
}

/// Order line: product, warehouse, quantity, price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub delivered: i64,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
    pub price_source: PriceSource,
    pub discount_bp: u32,
    pub tax_bp: u32,
    pub amounts: LineAmounts,
}

impl SalesOrderLine {
    pub fn outstanding(&self) -> i64 {
        self.quantity - self.delivered
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub line_no: u32,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<BatchAllocation>,
}

/// One shipment against the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub delivered_at: DateTime<Utc>,
    pub delivered_by: UserId,
    pub lines: Vec<DeliveryLine>,
}

/// Aggregate root: SalesOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesOrder {
    pub id: SalesOrderId,
    pub tenant_id: TenantId,
    pub number: String,
    pub customer_id: PartyId,
    pub order_date: NaiveDate,
    pub status: SalesOrderStatus,
    pub lines: Vec<SalesOrderLine>,
    #[serde(default)]
    pub deliveries: Vec<Delivery>,
    pub totals: DocumentTotals,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request body line; the price is optional and resolved by the workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesOrderLine {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub tax_bp: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSalesOrder {
    pub customer_id: PartyId,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    pub lines: Vec<NewSalesOrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A line with its price already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLineDraft {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_price: u64,
    pub price_source: PriceSource,
    pub discount_bp: u32,
    pub tax_bp: u32,
}

/// Quantity to ship for one line, optionally from chosen batches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryRequest {
    pub line_no: u32,
    pub quantity: i64,
    #[serde(default)]
    pub batches: Vec<BatchRequest>,
}

/// Stock to issue for a validated delivery line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedIssue {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub batches: Vec<BatchRequest>,
}

/// Undelivered remainder of a line, released when the order is cancelled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

impl SalesOrder {
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        tenant_id: TenantId,
        id: SalesOrderId,
        number: String,
        customer_id: PartyId,
        order_date: NaiveDate,
        lines: Vec<OrderLineDraft>,
        notes: Option<String>,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("sales order needs at least one line"));
        }

        let mut seen = HashSet::new();
        let mut order_lines = Vec::with_capacity(lines.len());
        for (idx, draft) in lines.into_iter().enumerate() {
            if !seen.insert((draft.product_id, draft.warehouse_id)) {
                return Err(DomainError::validation(format!(
                    "product {} appears twice for warehouse {}",
                    draft.product_id, draft.warehouse_id
                )));
            }
            let amounts =
                LineAmounts::compute(draft.quantity, draft.unit_price, draft.discount_bp, draft.tax_bp)?;
            order_lines.push(SalesOrderLine {
                line_no: idx as u32 + 1,
                product_id: draft.product_id,
                warehouse_id: draft.warehouse_id,
                quantity: draft.quantity,
                delivered: 0,
                unit_price: draft.unit_price,
                price_source: draft.price_source,
                discount_bp: draft.discount_bp,
                tax_bp: draft.tax_bp,
                amounts,
            });
        }

        let totals = DocumentTotals::sum(order_lines.iter().map(|l| &l.amounts))?;
        Ok(Self {
            id,
            tenant_id,
            number,
            customer_id,
            order_date,
            status: SalesOrderStatus::Open,
            lines: order_lines,
            deliveries: Vec::new(),
            totals,
            notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_deliverable(&self) -> bool {
        matches!(
            self.status,
            SalesOrderStatus::Open | SalesOrderStatus::PartiallyDelivered
        )
    }

    fn line(&self, line_no: u32) -> DomainResult<&SalesOrderLine> {
        self.lines
            .iter()
            .find(|l| l.line_no == line_no)
            .ok_or_else(|| DomainError::validation(format!("order has no line {line_no}")))
    }

    /// Validate a delivery and say what to issue. An empty request ships
    /// everything outstanding.
    pub fn plan_delivery(&self, requests: &[DeliveryRequest]) -> DomainResult<Vec<PlannedIssue>> {
        if !self.is_deliverable() {
            return Err(DomainError::invariant(format!(
                "order {} is {:?} and cannot be delivered",
                self.number, self.status
            )));
        }

        if requests.is_empty() {
            return Ok(self
                .lines
                .iter()
                .filter(|l| l.outstanding() > 0)
                .map(|l| PlannedIssue {
                    line_no: l.line_no,
                    product_id: l.product_id,
                    warehouse_id: l.warehouse_id,
                    quantity: l.outstanding(),
                    batches: Vec::new(),
                })
                .collect());
        }

        let mut seen = HashSet::new();
        let mut plan = Vec::with_capacity(requests.len());
        for req in requests {
            if !seen.insert(req.line_no) {
                return Err(DomainError::validation(format!(
                    "line {} listed twice in delivery",
                    req.line_no
                )));
            }
            let line = self.line(req.line_no)?;
            if req.quantity <= 0 {
                return Err(DomainError::validation("delivery quantity must be positive"));
            }
            if req.quantity > line.outstanding() {
                return Err(DomainError::validation(format!(
                    "line {} has {} outstanding, cannot deliver {}",
                    line.line_no,
                    line.outstanding(),
                    req.quantity
                )));
            }
            plan.push(PlannedIssue {
                line_no: line.line_no,
                product_id: line.product_id,
                warehouse_id: line.warehouse_id,
                quantity: req.quantity,
                batches: req.batches.clone(),
            });
        }
        Ok(plan)
    }

    /// Apply an issued delivery and recompute the status.
    pub fn record_delivery(
        &mut self,
        lines: Vec<DeliveryLine>,
        delivered_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if !self.is_deliverable() {
            return Err(DomainError::invariant(format!(
                "order {} is {:?} and cannot be delivered",
                self.number, self.status
            )));
        }
        if lines.is_empty() {
            return Err(DomainError::validation("nothing to deliver"));
        }
        for dl in &lines {
            let line = self.line(dl.line_no)?;
            if dl.quantity <= 0 || dl.quantity > line.outstanding() {
                return Err(DomainError::validation(format!(
                    "invalid delivery quantity {} for line {}",
                    dl.quantity, dl.line_no
                )));
            }
        }

        for dl in &lines {
            if let Some(line) = self.lines.iter_mut().find(|l| l.line_no == dl.line_no) {
                line.delivered += dl.quantity;
            }
        }
        self.deliveries.push(Delivery {
            delivered_at: now,
            delivered_by,
            lines,
        });
        self.status = self.derived_status();
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the order, returning what must be released from reservations.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<Vec<OutstandingLine>> {
        if !self.is_deliverable() {
            return Err(DomainError::invariant(format!(
                "order {} is {:?} and cannot be cancelled",
                self.number, self.status
            )));
        }
        let outstanding = self
            .lines
            .iter()
            .filter(|l| l.outstanding() > 0)
            .map(|l| OutstandingLine {
                line_no: l.line_no,
                product_id: l.product_id,
                warehouse_id: l.warehouse_id,
                quantity: l.outstanding(),
            })
            .collect();
        self.status = SalesOrderStatus::Cancelled;
        self.updated_at = now;
        Ok(outstanding)
    }

    fn derived_status(&self) -> SalesOrderStatus {
        if self.lines.iter().all(|l| l.outstanding() == 0) {
            SalesOrderStatus::Delivered
        } else if self.lines.iter().any(|l| l.delivered > 0) {
            SalesOrderStatus::PartiallyDelivered
        } else {
            SalesOrderStatus::Open
        }
    }
}

impl Entity for SalesOrder {
    type Id = SalesOrderId;
    const COLLECTION: &'static str = "sales_orders";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}
