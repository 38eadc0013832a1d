use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId};

mercato_core::document_id!(
    /// Warehouse identifier.
    WarehouseId
);

/// A stock location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub tenant_id: TenantId,
    /// Short code, unique per tenant (e.g. "MAIN").
    pub code: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWarehouse {
    pub code: String,
    pub name: String,
}

impl Warehouse {
    pub fn create(
        tenant_id: TenantId,
        id: WarehouseId,
        input: NewWarehouse,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let code = input.code.trim().to_uppercase();
        if code.is_empty() {
            return Err(DomainError::validation("warehouse code cannot be empty"));
        }
        if code.chars().any(char::is_whitespace) {
            return Err(DomainError::validation("warehouse code cannot contain whitespace"));
        }
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("warehouse name cannot be empty"));
        }
        Ok(Self {
            id,
            tenant_id,
            code,
            name: input.name.trim().to_string(),
            created_at: now,
        })
    }
}

impl Entity for Warehouse {
    type Id = WarehouseId;
    const COLLECTION: &'static str = "warehouses";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}
