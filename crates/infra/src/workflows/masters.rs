//! Master data: products, customers/suppliers, warehouses.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use mercato_core::DomainError;
use mercato_inventory::{NewWarehouse, Warehouse, WarehouseId};
use mercato_parties::{NewParty, Party, PartyId, PartyKind, PartyUpdate};
use mercato_pricing::PriceList;
use mercato_products::{NewProduct, Product, ProductId, ProductUpdate};

use crate::store::{Filter, StoreTx, typed};

use super::{Actor, WorkflowResult, Workflows, finish, read, unique};

/// Party update plus the active flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyChanges {
    #[serde(flatten)]
    pub fields: PartyUpdate,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub suspension_reason: Option<String>,
}

pub(crate) async fn load_product(tx: &mut dyn StoreTx, id: ProductId) -> WorkflowResult<(u64, Product)> {
    let v = typed::load::<Product>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("product {id}")))?;
    Ok((v.version, v.value))
}

pub(crate) async fn load_party(
    tx: &mut dyn StoreTx,
    id: PartyId,
    kind: PartyKind,
) -> WorkflowResult<(u64, Party)> {
    let v = typed::load::<Party>(tx, &id.to_string())
        .await?
        .filter(|v| v.value.kind == kind)
        .ok_or_else(|| DomainError::not_found(format!("{} {id}", kind.as_str())))?;
    Ok((v.version, v.value))
}

async fn ensure_price_list(tx: &mut dyn StoreTx, party: &Party) -> WorkflowResult<()> {
    if let Some(id) = party.price_list_id {
        typed::load::<PriceList>(tx, &id.to_string())
            .await?
            .ok_or_else(|| DomainError::validation(format!("price list {id} does not exist")))?;
    }
    Ok(())
}

impl Workflows {
    pub async fn create_product(&self, actor: &Actor, input: NewProduct) -> WorkflowResult<Product> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let product = Product::create(actor.tenant_id, ProductId::new(), input, Utc::now())?;
            unique::claim(&mut *tx, "product_sku", &product.sku, &product.id.to_string(), "SKU").await?;
            typed::insert(&mut *tx, &product).await?;
            Ok(product)
        }
        .await;
        let product = finish(tx, result, "product.create").await?;
        tracing::info!(tenant = %actor.tenant_id, sku = %product.sku, "product created");
        Ok(product)
    }

    pub async fn update_product(
        &self,
        actor: &Actor,
        id: ProductId,
        update: ProductUpdate,
    ) -> WorkflowResult<Product> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut product) = load_product(&mut *tx, id).await?;
            product.update(update, Utc::now())?;
            typed::save(&mut *tx, &product, version).await?;
            Ok(product)
        }
        .await;
        finish(tx, result, "product.update").await
    }

    pub async fn get_product(&self, actor: &Actor, id: ProductId) -> WorkflowResult<Product> {
        let mut tx = self.begin(actor).await?;
        let result = load_product(&mut *tx, id).await.map(|(_, p)| p);
        read(tx, result).await
    }

    pub async fn list_products(&self, actor: &Actor) -> WorkflowResult<Vec<Product>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<Product>(&mut *tx, &Filter::all())
            .await
            .map(|v| v.into_iter().map(|p| p.value).collect())
            .map_err(Into::into);
        read(tx, result).await
    }

    pub async fn create_party(&self, actor: &Actor, kind: PartyKind, input: NewParty) -> WorkflowResult<Party> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let party = Party::register(actor.tenant_id, PartyId::new(), kind, input, Utc::now())?;
            ensure_price_list(&mut *tx, &party).await?;
            typed::insert(&mut *tx, &party).await?;
            Ok(party)
        }
        .await;
        finish(tx, result, "party.create").await
    }

    pub async fn update_party(
        &self,
        actor: &Actor,
        kind: PartyKind,
        id: PartyId,
        changes: PartyChanges,
    ) -> WorkflowResult<Party> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut party) = load_party(&mut *tx, id, kind).await?;
            let now = Utc::now();
            party.update(changes.fields, now)?;
            match changes.active {
                Some(true) if !party.can_transact() => party.reactivate(now)?,
                Some(false) if party.can_transact() => party.suspend(changes.suspension_reason, now)?,
                _ => {}
            }
            ensure_price_list(&mut *tx, &party).await?;
            typed::save(&mut *tx, &party, version).await?;
            Ok(party)
        }
        .await;
        finish(tx, result, "party.update").await
    }

    pub async fn get_party(&self, actor: &Actor, kind: PartyKind, id: PartyId) -> WorkflowResult<Party> {
        let mut tx = self.begin(actor).await?;
        let result = load_party(&mut *tx, id, kind).await.map(|(_, p)| p);
        read(tx, result).await
    }

    pub async fn list_parties(&self, actor: &Actor, kind: PartyKind) -> WorkflowResult<Vec<Party>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<Party>(&mut *tx, &Filter::all().eq("kind", kind))
            .await
            .map(|v| v.into_iter().map(|p| p.value).collect())
            .map_err(Into::into);
        read(tx, result).await
    }

    pub async fn create_warehouse(&self, actor: &Actor, input: NewWarehouse) -> WorkflowResult<Warehouse> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let warehouse = Warehouse::create(actor.tenant_id, WarehouseId::new(), input, Utc::now())?;
            unique::claim(
                &mut *tx,
                "warehouse_code",
                &warehouse.code,
                &warehouse.id.to_string(),
                "warehouse code",
            )
            .await?;
            typed::insert(&mut *tx, &warehouse).await?;
            Ok(warehouse)
        }
        .await;
        finish(tx, result, "warehouse.create").await
    }

    pub async fn list_warehouses(&self, actor: &Actor) -> WorkflowResult<Vec<Warehouse>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<Warehouse>(&mut *tx, &Filter::all())
            .await
            .map(|v| v.into_iter().map(|w| w.value).collect())
            .map_err(Into::into);
        read(tx, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::WorkflowError;
    use crate::workflows::testing::Fixture;
    use mercato_products::ProductStatus;

    #[tokio::test]
    async fn duplicate_sku_is_a_conflict() {
        let fx = Fixture::new();
        fx.product("ab-1", false, Some(100)).await;
        let err = fx
            .wf
            .create_product(
                &fx.actor,
                NewProduct {
                    sku: " AB-1 ".into(),
                    name: "Again".into(),
                    uom: None,
                    default_price: None,
                    batch_managed: false,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Conflict(_))));
        assert_eq!(fx.wf.list_products(&fx.actor).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn same_sku_is_fine_in_another_tenant() {
        let fx = Fixture::new();
        fx.product("AB-1", false, None).await;
        let other = fx.other_tenant();
        let p = fx
            .wf
            .create_product(
                &other,
                NewProduct {
                    sku: "AB-1".into(),
                    name: "Theirs".into(),
                    uom: None,
                    default_price: None,
                    batch_managed: false,
                },
            )
            .await
            .unwrap();
        assert!(fx.wf.get_product(&fx.actor, p.id).await.is_err());
    }

    #[tokio::test]
    async fn duplicate_warehouse_code_is_a_conflict() {
        let fx = Fixture::new();
        fx.warehouse("main").await;
        let err = fx
            .wf
            .create_warehouse(
                &fx.actor,
                NewWarehouse {
                    code: "MAIN".into(),
                    name: "Second".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn parties_are_listed_by_kind_and_can_be_suspended() {
        let fx = Fixture::new();
        let customer = fx.customer("Acme").await;
        fx.supplier("Parts Co").await;
        assert_eq!(fx.wf.list_parties(&fx.actor, PartyKind::Customer).await.unwrap().len(), 1);

        // A customer is not reachable through the supplier endpoints.
        assert!(fx.wf.get_party(&fx.actor, PartyKind::Supplier, customer.id).await.is_err());

        let updated = fx
            .wf
            .update_party(
                &fx.actor,
                PartyKind::Customer,
                customer.id,
                PartyChanges {
                    active: Some(false),
                    suspension_reason: Some("credit hold".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!updated.can_transact());
    }

    #[tokio::test]
    async fn archiving_a_product() {
        let fx = Fixture::new();
        let p = fx.product("X-1", false, None).await;
        let p = fx
            .wf
            .update_product(
                &fx.actor,
                p.id,
                ProductUpdate {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(p.status, ProductStatus::Archived);
    }
}
