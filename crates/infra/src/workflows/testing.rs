//! Shared fixtures for workflow tests.

use std::sync::Arc;

use chrono::NaiveDate;

use mercato_core::{TenantId, UserId};
use mercato_inventory::{BatchReceipt, InventoryRecord, NewWarehouse, Warehouse, WarehouseId};
use mercato_parties::{NewParty, Party, PartyKind};
use mercato_pricing::{NewPriceList, PriceList, PriceListEntry};
use mercato_products::{NewProduct, Product, ProductId};

use crate::store::InMemoryDocumentStore;

use super::inventory::AdjustRequest;
use super::{Actor, WorkflowConfig, Workflows};

pub(crate) struct Fixture {
    pub wf: Workflows,
    pub actor: Actor,
}

pub(crate) fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        Self {
            wf: Workflows::new(store, WorkflowConfig::default()),
            actor: Actor::new(TenantId::new(), UserId::new()),
        }
    }

    pub fn other_tenant(&self) -> Actor {
        Actor::new(TenantId::new(), UserId::new())
    }

    pub async fn product(&self, sku: &str, batch_managed: bool, default_price: Option<u64>) -> Product {
        self.wf
            .create_product(
                &self.actor,
                NewProduct {
                    sku: sku.into(),
                    name: format!("Product {sku}"),
                    uom: None,
                    default_price,
                    batch_managed,
                },
            )
            .await
            .unwrap()
    }

    pub async fn warehouse(&self, code: &str) -> Warehouse {
        self.wf
            .create_warehouse(
                &self.actor,
                NewWarehouse {
                    code: code.into(),
                    name: format!("Warehouse {code}"),
                },
            )
            .await
            .unwrap()
    }

    async fn party(&self, kind: PartyKind, name: &str) -> Party {
        self.wf
            .create_party(
                &self.actor,
                kind,
                NewParty {
                    name: name.into(),
                    contact: None,
                    tax_id: None,
                    price_list_id: None,
                },
            )
            .await
            .unwrap()
    }

    pub async fn customer(&self, name: &str) -> Party {
        self.party(PartyKind::Customer, name).await
    }

    pub async fn supplier(&self, name: &str) -> Party {
        self.party(PartyKind::Supplier, name).await
    }

    pub async fn price_list(&self, product_id: ProductId, unit_price: u64) -> PriceList {
        self.wf
            .create_price_list(
                &self.actor,
                NewPriceList {
                    name: "Wholesale".into(),
                    currency: "INR".into(),
                    valid_from: None,
                    valid_to: None,
                    entries: vec![PriceListEntry {
                        product_id,
                        min_quantity: 1,
                        unit_price,
                    }],
                },
            )
            .await
            .unwrap()
    }

    /// Put untracked stock on hand at a unit cost of 100.
    pub async fn stock(&self, product_id: ProductId, warehouse_id: WarehouseId, quantity: i64) {
        self.wf
            .adjust_stock(
                &self.actor,
                AdjustRequest {
                    product_id,
                    warehouse_id,
                    delta: quantity,
                    reason: "opening stock".into(),
                    unit_cost: Some(100),
                    batch: None,
                    batches: vec![],
                },
            )
            .await
            .unwrap();
    }

    pub async fn stock_batch(
        &self,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        quantity: i64,
        batch_number: &str,
        expiry_date: Option<NaiveDate>,
    ) {
        self.wf
            .adjust_stock(
                &self.actor,
                AdjustRequest {
                    product_id,
                    warehouse_id,
                    delta: quantity,
                    reason: "opening stock".into(),
                    unit_cost: Some(100),
                    batch: Some(BatchReceipt {
                        batch_number: batch_number.into(),
                        expiry_date,
                        manufactured_on: None,
                    }),
                    batches: vec![],
                },
            )
            .await
            .unwrap();
    }

    pub async fn row(&self, product_id: ProductId, warehouse_id: WarehouseId) -> InventoryRecord {
        self.wf
            .get_inventory(&self.actor, product_id, warehouse_id)
            .await
            .unwrap()
    }
}
