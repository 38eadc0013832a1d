use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DocumentTotals, DomainError, DomainResult, Entity, LineAmounts, TenantId, UserId};
use mercato_inventory::{BatchAllocation, BatchRequest, WarehouseId};
use mercato_parties::PartyId;
use mercato_pricing::PriceSource;
use mercato_products::ProductId;

mercato_core::document_id!(
    /// POS sale identifier.
    PosSaleId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub method: PaymentMethod,
    pub amount: u64,
    /// Card slip / transaction reference.
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub price_source: PriceSource,
    pub discount_bp: u32,
    pub tax_bp: u32,
    pub amounts: LineAmounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allocations: Vec<BatchAllocation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosSale {
    pub id: PosSaleId,
    pub tenant_id: TenantId,
    pub number: String,
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<PosLine>,
    pub payments: Vec<Payment>,
    pub totals: DocumentTotals,
    pub paid: u64,
    pub change_due: u64,
    pub cashier: UserId,
    pub sold_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosLine {
    pub product_id: ProductId,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: Option<u64>,
    #[serde(default)]
    pub discount_bp: u32,
    #[serde(default)]
    pub tax_bp: u32,
    #[serde(default)]
    pub batches: Vec<BatchRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPosSale {
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    pub warehouse_id: WarehouseId,
    pub lines: Vec<NewPosLine>,
    pub payments: Vec<Payment>,
}

/// A line with its price already resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PosLineDraft {
    pub product_id: ProductId,
    pub quantity: i64,
    pub unit_price: u64,
    pub price_source: PriceSource,
    pub discount_bp: u32,
    pub tax_bp: u32,
}

impl PosSale {
    /// Price the basket and settle the payments.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        tenant_id: TenantId,
        id: PosSaleId,
        number: String,
        customer_id: Option<PartyId>,
        warehouse_id: WarehouseId,
        lines: Vec<PosLineDraft>,
        payments: Vec<Payment>,
        cashier: UserId,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("sale needs at least one line"));
        }

        let lines = lines
            .into_iter()
            .enumerate()
            .map(|(idx, d)| {
                Ok(PosLine {
                    line_no: idx as u32 + 1,
                    product_id: d.product_id,
                    quantity: d.quantity,
                    unit_price: d.unit_price,
                    price_source: d.price_source,
                    discount_bp: d.discount_bp,
                    tax_bp: d.tax_bp,
                    amounts: LineAmounts::compute(d.quantity, d.unit_price, d.discount_bp, d.tax_bp)?,
                    allocations: Vec::new(),
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;
        let totals = DocumentTotals::sum(lines.iter().map(|l| &l.amounts))?;

        let (paid, change_due) = settle(&payments, totals.total)?;

        Ok(Self {
            id,
            tenant_id,
            number,
            customer_id,
            warehouse_id,
            lines,
            payments,
            totals,
            paid,
            change_due,
            cashier,
            sold_at: now,
        })
    }
}

/// Check tendered payments against the grand total; returns (paid, change).
fn settle(payments: &[Payment], total: u64) -> DomainResult<(u64, u64)> {
    if payments.iter().any(|p| p.amount == 0) {
        return Err(DomainError::validation("payment amounts must be positive"));
    }
    let paid: u64 = payments.iter().map(|p| p.amount).sum();
    let non_cash: u64 = payments
        .iter()
        .filter(|p| p.method != PaymentMethod::Cash)
        .map(|p| p.amount)
        .sum();

    if paid < total {
        return Err(DomainError::validation(format!(
            "payments total {paid} is less than sale total {total}"
        )));
    }
    if non_cash > total {
        return Err(DomainError::validation(format!(
            "non-cash payments {non_cash} exceed sale total {total}"
        )));
    }
    Ok((paid, paid - total))
}

impl Entity for PosSale {
    type Id = PosSaleId;
    const COLLECTION: &'static str = "pos_sales";

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

    fn pay(method: PaymentMethod, amount: u64) -> Payment {
        Payment {
            method,
            amount,
            reference: None,
        }
    }

    fn sale(payments: Vec<Payment>) -> DomainResult<PosSale> {
        PosSale::create(
            TenantId::new(),
            PosSaleId::new(),
            "POS-00001".into(),
            None,
            WarehouseId::new(),
            vec![PosLineDraft {
                product_id: ProductId::new(),
                quantity: 2,
                unit_price: 450,
                price_source: PriceSource::ProductDefault,
                discount_bp: 0,
                tax_bp: 0,
            }],
            payments,
            UserId::new(),
            Utc::now(),
        )
    }

    #[test]
    fn cash_overpayment_gives_change() {
        let s = sale(vec![pay(PaymentMethod::Cash, 1_000)]).unwrap();
        assert_eq!(s.totals.total, 900);
        assert_eq!(s.paid, 1_000);
        assert_eq!(s.change_due, 100);
    }

    #[test]
    fn split_tender_is_accepted() {
        let s = sale(vec![pay(PaymentMethod::Card, 500), pay(PaymentMethod::Cash, 500)]).unwrap();
        assert_eq!(s.change_due, 100);
    }

    #[test]
    fn underpayment_is_rejected() {
        assert!(sale(vec![pay(PaymentMethod::Cash, 899)]).is_err());
        assert!(sale(vec![]).is_err());
    }

    #[test]
    fn card_cannot_exceed_total() {
        let err = sale(vec![pay(PaymentMethod::Card, 1_000)]).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
