//! Line and document amount arithmetic.
//!
//! Money is carried in the smallest currency unit (e.g. cents) and rates in
//! basis points (10000 = 100%). Rounding is half-up, once per line.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// 100% expressed in basis points.
pub const FULL_RATE_BP: u32 = 10_000;

fn apply_rate(value: u64, rate_bp: u32) -> u64 {
    let scaled = value as u128 * rate_bp as u128 + (FULL_RATE_BP as u128 / 2);
    (scaled / FULL_RATE_BP as u128) as u64
}

/// Computed amounts of a single priced line.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineAmounts {
    pub gross: u64,
    pub discount: u64,
    pub net: u64,
    pub tax: u64,
    pub total: u64,
}

impl LineAmounts {
    pub fn compute(
        quantity: i64,
        unit_price: u64,
        discount_bp: u32,
        tax_bp: u32,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("quantity must be positive"));
        }
        if discount_bp > FULL_RATE_BP {
            return Err(DomainError::validation("discount cannot exceed 100%"));
        }

        let gross = (quantity as u64)
            .checked_mul(unit_price)
            .ok_or_else(|| DomainError::validation("line amount overflow"))?;
        let discount = apply_rate(gross, discount_bp);
        let net = gross - discount;
        let tax = apply_rate(net, tax_bp);

        Ok(Self {
            gross,
            discount,
            net,
            tax,
            total: add(net, tax)?,
        })
    }
}

/// Totals of a document, summed over its lines.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: u64,
    pub discount: u64,
    pub tax: u64,
    pub total: u64,
}

impl DocumentTotals {
    pub fn sum<'a>(lines: impl IntoIterator<Item = &'a LineAmounts>) -> DomainResult<Self> {
        lines.into_iter().try_fold(Self::default(), |acc, l| {
            Ok(Self {
                subtotal: add(acc.subtotal, l.gross)?,
                discount: add(acc.discount, l.discount)?,
                tax: add(acc.tax, l.tax)?,
                total: add(acc.total, l.total)?,
            })
        })
    }
}

fn add(a: u64, b: u64) -> DomainResult<u64> {
    a.checked_add(b)
        .ok_or_else(|| DomainError::validation("document total overflow"))
}
