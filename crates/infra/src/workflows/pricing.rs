//! Price lists and price lookups.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::DomainError;
use mercato_parties::{Party, PartyId, PartyKind};
use mercato_pricing::{NewPriceList, PriceList, PriceListId, ResolvedPrice, resolve_line_price};
use mercato_products::ProductId;

use crate::store::{Filter, StoreTx, typed};

use super::masters::{load_party, load_product};
use super::{Actor, WorkflowResult, Workflows, finish, read};

/// Ask what a customer would pay for a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub product_id: ProductId,
    #[serde(default)]
    pub customer_id: Option<PartyId>,
    #[serde(default = "one")]
    pub quantity: i64,
    /// Defaults to today.
    #[serde(default)]
    pub on: Option<NaiveDate>,
}

fn one() -> i64 {
    1
}

async fn load_versioned(tx: &mut dyn StoreTx, id: PriceListId) -> WorkflowResult<(u64, PriceList)> {
    let stored = typed::load::<PriceList>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("price list {id}")))?;
    Ok((stored.version, stored.value))
}

async fn load_price_list(tx: &mut dyn StoreTx, id: PriceListId) -> WorkflowResult<PriceList> {
    Ok(load_versioned(tx, id).await?.1)
}

/// The price list attached to `customer`, if any.
pub(crate) async fn customer_price_list(
    tx: &mut dyn StoreTx,
    customer: Option<&Party>,
) -> WorkflowResult<Option<PriceList>> {
    match customer.and_then(|c| c.price_list_id) {
        Some(id) => Ok(Some(load_price_list(tx, id).await?)),
        None => Ok(None),
    }
}

impl Workflows {
    pub async fn create_price_list(&self, actor: &Actor, input: NewPriceList) -> WorkflowResult<PriceList> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let list = PriceList::create(actor.tenant_id, PriceListId::new(), input, Utc::now())?;
            for entry in &list.entries {
                load_product(&mut *tx, entry.product_id).await?;
            }
            typed::insert(&mut *tx, &list).await?;
            Ok(list)
        }
        .await;
        finish(tx, result, "price_list.create").await
    }

    /// Stop a list from resolving prices. Customers keep the reference.
    pub async fn deactivate_price_list(&self, actor: &Actor, id: PriceListId) -> WorkflowResult<PriceList> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut list) = load_versioned(&mut *tx, id).await?;
            list.deactivate()?;
            typed::save(&mut *tx, &list, version).await?;
            Ok(list)
        }
        .await;
        finish(tx, result, "price_list.deactivate").await
    }

    pub async fn get_price_list(&self, actor: &Actor, id: PriceListId) -> WorkflowResult<PriceList> {
        let mut tx = self.begin(actor).await?;
        let result = load_price_list(&mut *tx, id).await;
        read(tx, result).await
    }

    pub async fn list_price_lists(&self, actor: &Actor) -> WorkflowResult<Vec<PriceList>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<PriceList>(&mut *tx, &Filter::all())
            .await
            .map(|v| v.into_iter().map(|l| l.value).collect())
            .map_err(Into::into);
        read(tx, result).await
    }

    /// Customer price list first, then the product default.
    pub async fn resolve_price(&self, actor: &Actor, query: PriceQuery) -> WorkflowResult<ResolvedPrice> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            if query.quantity <= 0 {
                return Err(DomainError::validation("quantity must be positive").into());
            }
            let product = load_product(&mut *tx, query.product_id).await?.1;
            let customer = match query.customer_id {
                Some(id) => Some(load_party(&mut *tx, id, PartyKind::Customer).await?.1),
                None => None,
            };
            let list = customer_price_list(&mut *tx, customer.as_ref()).await?;
            let on = query.on.unwrap_or_else(|| Utc::now().date_naive());
            Ok(resolve_line_price(None, list.as_ref(), &product, query.quantity, on)?)
        }
        .await;
        read(tx, result).await
    }
}
