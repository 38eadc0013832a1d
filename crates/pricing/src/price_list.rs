use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId};
use mercato_products::{Product, ProductId};

mercato_core::document_id!(
    /// Price list identifier.
    PriceListId
);

/// One price tier of a product on a price list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceListEntry {
    pub product_id: ProductId,
    /// Tier applies from this ordered quantity upwards.
    #[serde(default = "default_min_quantity")]
    pub min_quantity: i64,
    pub unit_price: u64,
}

fn default_min_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceList {
    pub id: PriceListId,
    pub tenant_id: TenantId,
    pub name: String,
    pub currency: String,
    pub valid_from: Option<NaiveDate>,
    pub valid_to: Option<NaiveDate>,
    pub active: bool,
    pub entries: Vec<PriceListEntry>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPriceList {
    pub name: String,
    pub currency: String,
    #[serde(default)]
    pub valid_from: Option<NaiveDate>,
    #[serde(default)]
    pub valid_to: Option<NaiveDate>,
    pub entries: Vec<PriceListEntry>,
}

impl PriceList {
    pub fn create(
        tenant_id: TenantId,
        id: PriceListId,
        input: NewPriceList,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let currency = input.currency.trim().to_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(DomainError::validation("currency must be a 3-letter ISO code"));
        }
        if let (Some(from), Some(to)) = (input.valid_from, input.valid_to) {
            if from > to {
                return Err(DomainError::validation("valid_from must not be after valid_to"));
            }
        }

        for (idx, e) in input.entries.iter().enumerate() {
            if e.min_quantity < 1 {
                return Err(DomainError::validation(format!(
                    "entry {idx}: min_quantity must be at least 1"
                )));
            }
            let duplicate = input.entries[..idx]
                .iter()
                .any(|o| o.product_id == e.product_id && o.min_quantity == e.min_quantity);
            if duplicate {
                return Err(DomainError::validation(format!(
                    "entry {idx}: duplicate tier for product {}",
                    e.product_id
                )));
            }
        }

        Ok(Self {
            id,
            tenant_id,
            name: input.name.trim().to_string(),
            currency,
            valid_from: input.valid_from,
            valid_to: input.valid_to,
            active: true,
            entries: input.entries,
            created_at: now,
        })
    }

    pub fn is_effective(&self, on: NaiveDate) -> bool {
        self.active
            && self.valid_from.is_none_or(|from| from <= on)
            && self.valid_to.is_none_or(|to| on <= to)
    }

    /// Unit price for `quantity` of `product_id` on date `on`.
    ///
    /// The tier with the largest `min_quantity` not above `quantity` wins.
    pub fn resolve(&self, product_id: ProductId, quantity: i64, on: NaiveDate) -> Option<u64> {
        if !self.is_effective(on) {
            return None;
        }
        self.entries
            .iter()
            .filter(|e| e.product_id == product_id && e.min_quantity <= quantity)
            .max_by_key(|e| e.min_quantity)
            .map(|e| e.unit_price)
    }

    /// Retire the list; it stops resolving prices.
    pub fn deactivate(&mut self) -> DomainResult<()> {
        if !self.active {
            return Err(DomainError::conflict(format!("price list {} is already inactive", self.name)));
        }
        self.active = false;
        Ok(())
    }
}

impl Entity for PriceList {
    type Id = PriceListId;
    const COLLECTION: &'static str = "price_lists";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

/// Where a line's unit price came from.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceSource {
    Explicit,
    PriceList { price_list_id: PriceListId },
    ProductDefault,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPrice {
    pub unit_price: u64,
    pub source: PriceSource,
}

/// Resolve a line price: explicit → price list → product default.
pub fn resolve_line_price(
    explicit: Option<u64>,
    price_list: Option<&PriceList>,
    product: &Product,
    quantity: i64,
    on: NaiveDate,
) -> DomainResult<ResolvedPrice> {
    if let Some(unit_price) = explicit {
        return Ok(ResolvedPrice {
            unit_price,
            source: PriceSource::Explicit,
        });
    }

    if let Some(list) = price_list {
        if let Some(unit_price) = list.resolve(product.id, quantity, on) {
            return Ok(ResolvedPrice {
                unit_price,
                source: PriceSource::PriceList {
                    price_list_id: list.id,
                },
            });
        }
    }

    product
        .default_price
        .map(|unit_price| ResolvedPrice {
            unit_price,
            source: PriceSource::ProductDefault,
        })
        .ok_or_else(|| DomainError::validation(format!("no price available for product {}", product.sku)))
}
