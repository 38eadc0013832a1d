//! Supplier (purchase) invoices.
//!
//! Posting an invoice is what brings stock in: each line is received into the
//! named warehouse at its landed unit cost.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DocumentTotals, DomainError, DomainResult, Entity, LineAmounts, TenantId, UserId};
use mercato_inventory::{BatchReceipt, WarehouseId};
use mercato_parties::PartyId;
use mercato_products::ProductId;

use crate::order::PurchaseOrderId;

mercato_core::document_id!(
    /// Purchase invoice identifier.
    PurchaseInvoiceId
);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoiceLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_cost: u64,
    pub discount_bp: u32,
    pub tax_bp: u32,
    #[serde(default)]
    pub batch: Option<BatchReceipt>,
    /// Purchase order line this line was received against.
    #[serde(default)]
    pub po_line_no: Option<u32>,
    pub amounts: LineAmounts,
}

impl PurchaseInvoiceLine {
    /// Net (after discount) cost of one unit, rounded half-up. Tax is not
    /// part of the stock value.
    pub fn landed_unit_cost(&self) -> u64 {
        let q = self.quantity.max(1) as u64;
        (self.amounts.net + q / 2) / q
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseInvoice {
    pub id: PurchaseInvoiceId,
    pub tenant_id: TenantId,
    pub number: String,
    pub supplier_id: PartyId,
    #[serde(default)]
    pub purchase_order_id: Option<PurchaseOrderId>,
    /// The supplier's own invoice number; unique per supplier.
    pub supplier_reference: String,
    pub invoice_date: NaiveDate,
    pub lines: Vec<PurchaseInvoiceLine>,
    pub totals: DocumentTotals,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseInvoiceLine {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
    pub quantity: i64,
    pub unit_cost: u64,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub tax_bp: u32,
    #[serde(default)]
    pub batch: Option<BatchReceipt>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchaseInvoice {
    pub supplier_id: PartyId,
    #[serde(default)]
    pub purchase_order_id: Option<PurchaseOrderId>,
    pub supplier_reference: String,
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,
    pub lines: Vec<NewPurchaseInvoiceLine>,
}

/// Canonical supplier reference used for duplicate detection.
pub fn normalize_reference(reference: &str) -> String {
    reference.trim().to_uppercase()
}

impl PurchaseInvoice {
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        tenant_id: TenantId,
        id: PurchaseInvoiceId,
        number: String,
        invoice_date: NaiveDate,
        input: NewPurchaseInvoice,
        created_by: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let supplier_reference = normalize_reference(&input.supplier_reference);
        if supplier_reference.is_empty() {
            return Err(DomainError::validation("supplier reference cannot be empty"));
        }
        if input.lines.is_empty() {
            return Err(DomainError::validation("purchase invoice needs at least one line"));
        }

        let lines = input
            .lines
            .into_iter()
            .enumerate()
            .map(|(idx, l)| {
                let amounts = LineAmounts::compute(l.quantity, l.unit_cost, l.discount_bp, l.tax_bp)?;
                Ok(PurchaseInvoiceLine {
                    line_no: idx as u32 + 1,
                    product_id: l.product_id,
                    warehouse_id: l.warehouse_id,
                    quantity: l.quantity,
                    unit_cost: l.unit_cost,
                    discount_bp: l.discount_bp,
                    tax_bp: l.tax_bp,
                    batch: l.batch,
                    po_line_no: None,
                    amounts,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let totals = DocumentTotals::sum(lines.iter().map(|l| &l.amounts))?;
        Ok(Self {
            id,
            tenant_id,
            number,
            supplier_id: input.supplier_id,
            purchase_order_id: input.purchase_order_id,
            supplier_reference,
            invoice_date,
            lines,
            totals,
            created_by,
            created_at: now,
        })
    }
}

impl Entity for PurchaseInvoice {
    type Id = PurchaseInvoiceId;
    const COLLECTION: &'static str = "purchase_invoices";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}
