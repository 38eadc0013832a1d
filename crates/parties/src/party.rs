use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId};
use mercato_pricing::PriceListId;

mercato_core::document_id!(
    /// Party identifier (tenant-scoped via the `tenant_id` field).
    PartyId
);

/// Party kind: customer or supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Supplier,
}

impl PartyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PartyKind::Customer => "customer",
            PartyKind::Supplier => "supplier",
        }
    }
}

/// Party status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyStatus {
    Active,
    Suspended,
}

/// Contact information for a party.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Customer or supplier master record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub tenant_id: TenantId,
    pub kind: PartyKind,
    pub name: String,
    pub contact: ContactInfo,
    /// Tax registration number (GSTIN, VAT id, ...).
    pub tax_id: Option<String>,
    /// Customers only: price list applied to their orders.
    pub price_list_id: Option<PriceListId>,
    pub status: PartyStatus,
    pub suspension_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewParty {
    pub name: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    #[serde(default)]
    pub tax_id: Option<String>,
    #[serde(default)]
    pub price_list_id: Option<PriceListId>,
}

/// Partial update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyUpdate {
    pub name: Option<String>,
    pub contact: Option<ContactInfo>,
    pub tax_id: Option<String>,
    pub price_list_id: Option<PriceListId>,
}

fn validate_email(contact: &ContactInfo) -> DomainResult<()> {
    if let Some(email) = &contact.email {
        let email = email.trim();
        let valid = email
            .split_once('@')
            .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
        if !valid {
            return Err(DomainError::validation(format!("invalid email '{email}'")));
        }
    }
    Ok(())
}

impl Party {
    pub fn register(
        tenant_id: TenantId,
        id: PartyId,
        kind: PartyKind,
        input: NewParty,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if kind == PartyKind::Supplier && input.price_list_id.is_some() {
            return Err(DomainError::validation("suppliers cannot carry a price list"));
        }
        let contact = input.contact.unwrap_or_default();
        validate_email(&contact)?;

        Ok(Self {
            id,
            tenant_id,
            kind,
            name: input.name.trim().to_string(),
            contact,
            tax_id: input.tax_id.map(|t| t.trim().to_uppercase()),
            price_list_id: input.price_list_id,
            status: PartyStatus::Active,
            suspension_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn update(&mut self, update: PartyUpdate, now: DateTime<Utc>) -> DomainResult<()> {
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name cannot be empty"));
            }
        }
        if let Some(contact) = &update.contact {
            validate_email(contact)?;
        }
        if self.kind == PartyKind::Supplier && update.price_list_id.is_some() {
            return Err(DomainError::validation("suppliers cannot carry a price list"));
        }

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(contact) = update.contact {
            self.contact = contact;
        }
        if let Some(tax_id) = update.tax_id {
            self.tax_id = Some(tax_id.trim().to_uppercase());
        }
        if let Some(price_list_id) = update.price_list_id {
            self.price_list_id = Some(price_list_id);
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn suspend(&mut self, reason: Option<String>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == PartyStatus::Suspended {
            return Err(DomainError::conflict("party is already suspended"));
        }
        self.status = PartyStatus::Suspended;
        self.suspension_reason = reason;
        self.updated_at = now;
        Ok(())
    }

    pub fn reactivate(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == PartyStatus::Active {
            return Err(DomainError::conflict("party is already active"));
        }
        self.status = PartyStatus::Active;
        self.suspension_reason = None;
        self.updated_at = now;
        Ok(())
    }

    /// Suspended parties cannot transact.
    pub fn can_transact(&self) -> bool {
        self.status == PartyStatus::Active
    }

    /// Ensure this party is an active party of the expected kind.
    pub fn ensure_counterparty(&self, kind: PartyKind) -> DomainResult<()> {
        if self.kind != kind {
            return Err(DomainError::validation(format!(
                "party {} is not a {}",
                self.name,
                kind.as_str()
            )));
        }
        if !self.can_transact() {
            return Err(DomainError::validation(format!(
                "{} {} is suspended",
                kind.as_str(),
                self.name
            )));
        }
        Ok(())
    }
}

impl Entity for Party {
    type Id = PartyId;
    const COLLECTION: &'static str = "parties";

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

    fn customer(name: &str) -> DomainResult<Party> {
        Party::register(
            TenantId::new(),
            PartyId::new(),
            PartyKind::Customer,
            NewParty {
                name: name.to_string(),
                contact: Some(ContactInfo {
                    email: Some("buyer@example.com".into()),
                    phone: None,
                    address: None,
                }),
                tax_id: Some(" 27abcde1234f1z5 ".into()),
                price_list_id: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn register_trims_and_normalizes() {
        let p = customer("  Acme Traders ").unwrap();
        assert_eq!(p.name, "Acme Traders");
        assert_eq!(p.tax_id.as_deref(), Some("27ABCDE1234F1Z5"));
        assert!(p.can_transact());
    }

    #[test]
    fn register_rejects_empty_name_and_bad_email() {
        assert!(matches!(customer("   "), Err(DomainError::Validation(_))));

        let err = Party::register(
            TenantId::new(),
            PartyId::new(),
            PartyKind::Supplier,
            NewParty {
                name: "Mill".into(),
                contact: Some(ContactInfo {
                    email: Some("nobody".into()),
                    ..Default::default()
                }),
                tax_id: None,
                price_list_id: None,
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn suspended_party_is_not_a_valid_counterparty() {
        let mut p = customer("Acme").unwrap();
        p.suspend(Some("credit hold".into()), Utc::now()).unwrap();
        assert!(p.ensure_counterparty(PartyKind::Customer).is_err());
        assert!(matches!(p.suspend(None, Utc::now()), Err(DomainError::Conflict(_))));
        p.reactivate(Utc::now()).unwrap();
        assert!(p.ensure_counterparty(PartyKind::Customer).is_ok());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let p = customer("Acme").unwrap();
        assert!(p.ensure_counterparty(PartyKind::Supplier).is_err());
    }

    #[test]
    fn suppliers_cannot_have_price_lists() {
        let err = Party::register(
            TenantId::new(),
            PartyId::new(),
            PartyKind::Supplier,
            NewParty {
                name: "Mill".into(),
                contact: None,
                tax_id: None,
                price_list_id: Some(PriceListId::new()),
            },
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
