use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DocumentTotals, DomainError, DomainResult, Entity, LineAmounts, TenantId, UserId};
use mercato_inventory::WarehouseId;
use mercato_parties::PartyId;
use mercato_products::ProductId;

use crate::invoice::PurchaseInvoice;

mercato_core::document_id!(
    /// Purchase order identifier (tenant-scoped via the `tenant_id` field).
    PurchaseOrderId
);

/// Purchase order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    Open,
    PartiallyReceived,
    Received,
    Cancelled,
}

/// Purchase order line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub received: i64,
    pub unit_cost: u64,
    pub amounts: LineAmounts,
}

impl PurchaseOrderLine {
    pub fn outstanding(&self) -> i64 {
        self.quantity - self.received
    }
}

/// Aggregate root: PurchaseOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub tenant_id: TenantId,
    pub number: String,
    pub supplier_id: PartyId,
    pub order_date: NaiveDate,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    pub status: PurchaseOrderStatus,
    pub lines: Vec<PurchaseOrderLine>,
    pub totals: DocumentTotals,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrderLine {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_cost: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_id: PartyId,
    #[serde(default)]
    pub order_date: Option<NaiveDate>,
    #[serde(default)]
    pub expected_date: Option<NaiveDate>,
    pub lines: Vec<NewPurchaseOrderLine>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Quantity still expected on a line (released from on-order on cancel).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreceivedLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
}

impl PurchaseOrder {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        tenant_id: TenantId,
        id: PurchaseOrderId,
        number: String,
        order_date: NaiveDate,
        input: NewPurchaseOrder,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.lines.is_empty() {
            return Err(DomainError::validation("purchase order needs at least one line"));
        }
        if let Some(expected) = input.expected_date {
            if expected < order_date {
                return Err(DomainError::validation("expected date is before the order date"));
            }
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(input.lines.len());
        for (idx, l) in input.lines.into_iter().enumerate() {
            if !seen.insert((l.product_id, l.warehouse_id)) {
                return Err(DomainError::validation(format!(
                    "product {} appears twice for warehouse {}",
                    l.product_id, l.warehouse_id
                )));
            }
            let amounts = LineAmounts::compute(l.quantity, l.unit_cost, 0, 0)?;
            lines.push(PurchaseOrderLine {
                line_no: idx as u32 + 1,
                product_id: l.product_id,
                warehouse_id: l.warehouse_id,
                quantity: l.quantity,
                received: 0,
                unit_cost: l.unit_cost,
                amounts,
            });
        }

        let totals = DocumentTotals::sum(lines.iter().map(|l| &l.amounts))?;
        Ok(Self {
            id,
            tenant_id,
            number,
            supplier_id: input.supplier_id,
            order_date,
            expected_date: input.expected_date,
            status: PurchaseOrderStatus::Open,
            lines,
            totals,
            notes: input.notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            created_by,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_receivable(&self) -> bool {
        matches!(
            self.status,
            PurchaseOrderStatus::Open | PurchaseOrderStatus::PartiallyReceived
        )
    }

    /// Match each invoice line to an order line by (product, warehouse) and
    /// book the received quantities.
    ///
    /// Sets `po_line_no` on matched invoice lines; unmatched lines are left as
    /// plain receipts. Nothing is changed when an error is returned.
    pub fn apply_invoice(
        &mut self,
        invoice: &mut PurchaseInvoice,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if invoice.supplier_id != self.supplier_id {
            return Err(DomainError::validation(format!(
                "invoice supplier does not match purchase order {}",
                self.number
            )));
        }
        if !self.is_receivable() {
            return Err(DomainError::invariant(format!(
                "purchase order {} is {:?} and cannot be received",
                self.number, self.status
            )));
        }

        let mut receipts: Vec<(usize, usize, i64)> = Vec::new();
        for (inv_idx, inv_line) in invoice.lines.iter().enumerate() {
            let Some(po_idx) = self.lines.iter().position(|l| {
                l.product_id == inv_line.product_id && l.warehouse_id == inv_line.warehouse_id
            }) else {
                continue;
            };
            let already: i64 = receipts
                .iter()
                .filter(|(idx, _, _)| *idx == po_idx)
                .map(|(_, _, q)| q)
                .sum();
            let line = &self.lines[po_idx];
            if already + inv_line.quantity > line.outstanding() {
                return Err(DomainError::validation(format!(
                    "over-receipt on {} line {}: {} outstanding, {} invoiced",
                    self.number,
                    line.line_no,
                    line.outstanding() - already,
                    inv_line.quantity
                )));
            }
            receipts.push((po_idx, inv_idx, inv_line.quantity));
        }

        for (po_idx, inv_idx, qty) in receipts {
            let line = &mut self.lines[po_idx];
            line.received += qty;
            invoice.lines[inv_idx].po_line_no = Some(line.line_no);
        }
        self.status = self.derived_status();
        self.updated_at = now;
        Ok(())
    }

    /// Cancel the order, returning the quantities to drop from on-order.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> DomainResult<Vec<UnreceivedLine>> {
        if !self.is_receivable() {
            return Err(DomainError::invariant(format!(
                "purchase order {} is {:?} and cannot be cancelled",
                self.number, self.status
            )));
        }
        let unreceived = self
            .lines
            .iter()
            .filter(|l| l.outstanding() > 0)
            .map(|l| UnreceivedLine {
                line_no: l.line_no,
                product_id: l.product_id,
                warehouse_id: l.warehouse_id,
                quantity: l.outstanding(),
            })
            .collect();
        self.status = PurchaseOrderStatus::Cancelled;
        self.updated_at = now;
        Ok(unreceived)
    }

    fn derived_status(&self) -> PurchaseOrderStatus {
        if self.lines.iter().all(|l| l.outstanding() == 0) {
            PurchaseOrderStatus::Received
        } else if self.lines.iter().any(|l| l.received > 0) {
            PurchaseOrderStatus::PartiallyReceived
        } else {
            PurchaseOrderStatus::Open
        }
    }
}

impl Entity for PurchaseOrder {
    type Id = PurchaseOrderId;
    const COLLECTION: &'static str = "purchase_orders";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{NewPurchaseInvoice, NewPurchaseInvoiceLine, PurchaseInvoiceId};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn po(supplier: PartyId, lines: Vec<NewPurchaseOrderLine>) -> PurchaseOrder {
        PurchaseOrder::create(
            TenantId::new(),
            PurchaseOrderId::new(),
            "PO-00001".into(),
            date(),
            NewPurchaseOrder {
                supplier_id: supplier,
                order_date: None,
                expected_date: None,
                lines,
                notes: None,
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    fn invoice(supplier: PartyId, order: &PurchaseOrder, lines: Vec<(ProductId, WarehouseId, i64)>) -> PurchaseInvoice {
        PurchaseInvoice::create(
            order.tenant_id,
            PurchaseInvoiceId::new(),
            "PI-00001".into(),
            date(),
            NewPurchaseInvoice {
                supplier_id: supplier,
                purchase_order_id: Some(order.id),
                supplier_reference: "INV-77".into(),
                invoice_date: None,
                lines: lines
                    .into_iter()
                    .map(|(product_id, warehouse_id, quantity)| NewPurchaseInvoiceLine {
                        product_id,
                        warehouse_id,
                        quantity,
                        unit_cost: 500,
                        discount_bp: 0,
                        tax_bp: 0,
                        batch: None,
                    })
                    .collect(),
            },
            UserId::new(),
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn invoice_receipts_move_status_forward() {
        let supplier = PartyId::new();
        let (p, wh) = (ProductId::new(), WarehouseId::new());
        let mut order = po(
            supplier,
            vec![NewPurchaseOrderLine {
                product_id: p,
                warehouse_id: wh,
                quantity: 10,
                unit_cost: 500,
            }],
        );

        let mut first = invoice(supplier, &order, vec![(p, wh, 4)]);
        order.apply_invoice(&mut first, Utc::now()).unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::PartiallyReceived);
        assert_eq!(first.lines[0].po_line_no, Some(1));

        let mut second = invoice(supplier, &order, vec![(p, wh, 6)]);
        order.apply_invoice(&mut second, Utc::now()).unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Received);
    }

    #[test]
    fn over_receipt_is_rejected_without_side_effects() {
        let supplier = PartyId::new();
        let (p, wh) = (ProductId::new(), WarehouseId::new());
        let mut order = po(
            supplier,
            vec![NewPurchaseOrderLine {
                product_id: p,
                warehouse_id: wh,
                quantity: 3,
                unit_cost: 500,
            }],
        );
        let before = order.clone();
        let mut inv = invoice(supplier, &order, vec![(p, wh, 4)]);
        assert!(matches!(
            order.apply_invoice(&mut inv, Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(order, before);
        assert_eq!(inv.lines[0].po_line_no, None);
    }

    #[test]
    fn unmatched_lines_stay_plain_receipts() {
        let supplier = PartyId::new();
        let wh = WarehouseId::new();
        let ordered = ProductId::new();
        let mut order = po(
            supplier,
            vec![NewPurchaseOrderLine {
                product_id: ordered,
                warehouse_id: wh,
                quantity: 3,
                unit_cost: 500,
            }],
        );
        let mut inv = invoice(supplier, &order, vec![(ProductId::new(), wh, 2)]);
        order.apply_invoice(&mut inv, Utc::now()).unwrap();
        assert_eq!(inv.lines[0].po_line_no, None);
        assert_eq!(order.status, PurchaseOrderStatus::Open);
    }

    #[test]
    fn other_supplier_cannot_invoice_the_order() {
        let (p, wh) = (ProductId::new(), WarehouseId::new());
        let mut order = po(
            PartyId::new(),
            vec![NewPurchaseOrderLine {
                product_id: p,
                warehouse_id: wh,
                quantity: 3,
                unit_cost: 500,
            }],
        );
        let other = PartyId::new();
        let mut inv = invoice(other, &order, vec![(p, wh, 1)]);
        assert!(order.apply_invoice(&mut inv, Utc::now()).is_err());
    }

    #[test]
    fn cancel_reports_unreceived_quantities() {
        let supplier = PartyId::new();
        let (p, wh) = (ProductId::new(), WarehouseId::new());
        let mut order = po(
            supplier,
            vec![NewPurchaseOrderLine {
                product_id: p,
                warehouse_id: wh,
                quantity: 10,
                unit_cost: 500,
            }],
        );
        let mut inv = invoice(supplier, &order, vec![(p, wh, 4)]);
        order.apply_invoice(&mut inv, Utc::now()).unwrap();

        let open = order.cancel(Utc::now()).unwrap();
        assert_eq!(open[0].quantity, 6);
        assert_eq!(order.status, PurchaseOrderStatus::Cancelled);
        assert!(order.cancel(Utc::now()).is_err());
    }

    #[test]
    fn rejects_duplicate_lines() {
        let (p, wh) = (ProductId::new(), WarehouseId::new());
        let line = NewPurchaseOrderLine {
            product_id: p,
            warehouse_id: wh,
            quantity: 1,
            unit_cost: 1,
        };
        let result = PurchaseOrder::create(
            TenantId::new(),
            PurchaseOrderId::new(),
            "PO-00002".into(),
            date(),
            NewPurchaseOrder {
                supplier_id: PartyId::new(),
                order_date: None,
                expected_date: None,
                lines: vec![line.clone(), line],
                notes: None,
            },
            UserId::new(),
            Utc::now(),
        );
        assert!(result.is_err());
    }
}
