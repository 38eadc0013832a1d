use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId};

mercato_core::document_id!(
    /// Product identifier (tenant-scoped via the `tenant_id` field).
    ProductId
);

/// Product status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Item master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    /// Unit of measure (e.g. "pcs", "kg").
    pub uom: String,
    /// Default selling price in smallest currency unit.
    pub default_price: Option<u64>,
    /// Stock of this product is tracked per batch/lot.
    pub batch_managed: bool,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Product::create`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub uom: Option<String>,
    #[serde(default)]
    pub default_price: Option<u64>,
    #[serde(default)]
    pub batch_managed: bool,
}

/// Partial update for [`Product::update`]. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub uom: Option<String>,
    pub default_price: Option<u64>,
    /// `false` archives, `true` re-activates.
    #[serde(default)]
    pub active: Option<bool>,
}

pub const DEFAULT_UOM: &str = "pcs";

/// Canonical SKU form used for uniqueness checks.
pub fn normalize_sku(sku: &str) -> String {
    sku.trim().to_uppercase()
}

impl Product {
    pub fn create(
        tenant_id: TenantId,
        id: ProductId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let sku = normalize_sku(&input.sku);
        if sku.is_empty() {
            return Err(DomainError::validation("SKU cannot be empty"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        let uom = input
            .uom
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_UOM.to_string());

        Ok(Self {
            id,
            tenant_id,
            sku,
            name: input.name.trim().to_string(),
            uom,
            default_price: input.default_price,
            batch_managed: input.batch_managed,
            status: ProductStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, update: ProductUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(uom) = update.uom {
            if uom.trim().is_empty() {
                return Err(DomainError::validation("uom cannot be empty"));
            }
            self.uom = uom.trim().to_string();
        }
        if let Some(price) = update.default_price {
            self.default_price = Some(price);
        }
        match update.active {
            Some(true) if self.status != ProductStatus::Active => self.activate(now)?,
            Some(false) if self.status != ProductStatus::Archived => self.archive(now)?,
            _ => {}
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn archive(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }
        self.status = ProductStatus::Archived;
        self.updated_at = now;
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }
        self.status = ProductStatus::Active;
        self.updated_at = now;
        Ok(())
    }

    /// Archived products cannot appear on new transactions.
    pub fn ensure_transactable(&self) -> DomainResult<()> {
        if self.status != ProductStatus::Active {
            return Err(DomainError::validation(format!(
                "product {} is archived",
                self.sku
            )));
        }
        Ok(())
    }
}

impl Entity for Product {
    type Id = ProductId;
    const COLLECTION: &'static str = "products";

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

    fn new_product(sku: &str, name: &str) -> NewProduct {
        NewProduct {
            sku: sku.to_string(),
            name: name.to_string(),
            uom: None,
            default_price: Some(1_250),
            batch_managed: false,
        }
    }

    #[test]
    fn create_normalizes_sku_and_defaults_uom() {
        let p = Product::create(
            TenantId::new(),
            ProductId::new(),
            new_product("  ab-12 ", " Widget "),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.sku, "AB-12");
        assert_eq!(p.name, "Widget");
        assert_eq!(p.uom, DEFAULT_UOM);
        assert_eq!(p.status, ProductStatus::Active);
    }

    #[test]
    fn create_rejects_empty_sku_or_name() {
        let t = TenantId::new();
        assert!(matches!(
            Product::create(t, ProductId::new(), new_product(" ", "x"), Utc::now()),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            Product::create(t, ProductId::new(), new_product("A", "  "), Utc::now()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn archived_product_is_not_transactable() {
        let mut p =
            Product::create(TenantId::new(), ProductId::new(), new_product("A", "B"), Utc::now())
                .unwrap();
        p.archive(Utc::now()).unwrap();
        assert!(p.ensure_transactable().is_err());
        assert!(matches!(p.archive(Utc::now()), Err(DomainError::Conflict(_))));
        p.activate(Utc::now()).unwrap();
        assert!(p.ensure_transactable().is_ok());
    }

    #[test]
    fn update_only_touches_given_fields() {
        let mut p =
            Product::create(TenantId::new(), ProductId::new(), new_product("A", "B"), Utc::now())
                .unwrap();
        p.update(
            ProductUpdate {
                default_price: Some(99),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.name, "B");
        assert_eq!(p.default_price, Some(99));
    }

    #[test]
    fn update_can_archive_and_reactivate() {
        let mut p =
            Product::create(TenantId::new(), ProductId::new(), new_product("A", "B"), Utc::now())
                .unwrap();
        let archive = ProductUpdate {
            active: Some(false),
            ..Default::default()
        };
        p.update(archive.clone(), Utc::now()).unwrap();
        assert_eq!(p.status, ProductStatus::Archived);
        // Repeating the same flag is not an error.
        p.update(archive, Utc::now()).unwrap();
        p.update(
            ProductUpdate {
                active: Some(true),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.status, ProductStatus::Active);
    }
}
