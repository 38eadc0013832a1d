//! Production orders: reserve components on release, consume them and
//! receive the finished product on completion.

use chrono::Utc;

use mercato_core::{DocumentKind, DomainError};
use mercato_inventory::{BatchReceipt, IssueMode, MovementKind, MovementReference};
use mercato_production::{NewProductionOrder, ProductionOrder, ProductionOrderId, ProductionStatus};

use crate::store::{Filter, StoreTx, typed};

use super::{Actor, StockLedger, WorkflowResult, Workflows, committed, finish, newest_first, read};

async fn load_order(
    tx: &mut dyn StoreTx,
    id: ProductionOrderId,
) -> WorkflowResult<(u64, ProductionOrder)> {
    let v = typed::load::<ProductionOrder>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("production order {id}")))?;
    Ok((v.version, v.value))
}

fn reference(order: &ProductionOrder) -> MovementReference {
    MovementReference::new(DocumentKind::ProductionOrder, order.id.document_id(), order.number.clone())
}

impl Workflows {
    pub async fn plan_production(
        &self,
        actor: &Actor,
        input: NewProductionOrder,
    ) -> WorkflowResult<ProductionOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            ledger.product(&mut *tx, input.product_id).await?.ensure_transactable()?;
            ledger.warehouse(&mut *tx, input.warehouse_id).await?;

            let number = self.next_number(&mut *tx, DocumentKind::ProductionOrder).await?;
            let order = ProductionOrder::plan(
                actor.tenant_id,
                ProductionOrderId::new(),
                number,
                input,
                actor.user_id,
                ledger.now(),
            )?;
            for c in &order.components {
                ledger.product(&mut *tx, c.product_id).await?.ensure_transactable()?;
                ledger.warehouse(&mut *tx, c.warehouse_id).await?;
            }
            typed::insert(&mut *tx, &order).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "production_order.plan").await?;
        committed("production_order.plan", actor, &order.number);
        Ok(order)
    }

    /// Reserve every component and book the finished quantity as on-order.
    pub async fn release_production(
        &self,
        actor: &Actor,
        id: ProductionOrderId,
    ) -> WorkflowResult<ProductionOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            order.release(now)?;

            let reference = reference(&order);
            for c in &order.components {
                ledger
                    .apply(&mut *tx, c.product_id, c.warehouse_id, Some(&reference), None, |row, _| {
                        row.reserve(c.required, now)
                    })
                    .await?;
            }
            ledger
                .apply(&mut *tx, order.product_id, order.warehouse_id, Some(&reference), None, |row, _| {
                    row.expect(order.quantity, now)
                })
                .await?;
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "production_order.release").await?;
        committed("production_order.release", actor, &order.number);
        Ok(order)
    }

    /// Consume the reserved components and receive the output at their cost.
    pub async fn complete_production(
        &self,
        actor: &Actor,
        id: ProductionOrderId,
        output_batch: Option<BatchReceipt>,
    ) -> WorkflowResult<ProductionOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            if order.status != ProductionStatus::Released {
                return Err(DomainError::invariant(format!(
                    "cannot complete production order {} in status {:?}",
                    order.number, order.status
                ))
                .into());
            }

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let reference = reference(&order);
            let mut consumed_cost: u64 = 0;
            for c in &order.components {
                let change = ledger
                    .apply(&mut *tx, c.product_id, c.warehouse_id, Some(&reference), None, |row, product| {
                        row.issue(
                            MovementKind::ProductionConsume,
                            c.required,
                            IssueMode::FromCommitment,
                            &[],
                            product.batch_managed,
                            now,
                        )
                    })
                    .await?;
                let cost = change.unit_cost.unwrap_or(0).saturating_mul(c.required as u64);
                consumed_cost = consumed_cost.saturating_add(cost);
            }

            let unit_cost = order.complete(output_batch.clone(), consumed_cost, now)?;
            ledger
                .apply(&mut *tx, order.product_id, order.warehouse_id, Some(&reference), None, |row, product| {
                    row.receive(
                        MovementKind::ProductionOutput,
                        order.quantity,
                        unit_cost,
                        output_batch,
                        true,
                        product.batch_managed,
                        now,
                    )
                })
                .await?;
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "production_order.complete").await?;
        committed("production_order.complete", actor, &order.number);
        Ok(order)
    }

    /// Cancel; a released order gives back its reservations and on-order.
    pub async fn cancel_production(
        &self,
        actor: &Actor,
        id: ProductionOrderId,
    ) -> WorkflowResult<ProductionOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let previous = order.cancel(now)?;

            if previous == ProductionStatus::Released {
                let reference = reference(&order);
                for c in &order.components {
                    ledger
                        .apply(&mut *tx, c.product_id, c.warehouse_id, Some(&reference), None, |row, _| {
                            row.release(c.required, now)
                        })
                        .await?;
                }
                ledger
                    .apply(&mut *tx, order.product_id, order.warehouse_id, Some(&reference), None, |row, _| {
                        row.cancel_expected(order.quantity, now)
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "production_order.cancel").await?;
        committed("production_order.cancel", actor, &order.number);
        Ok(order)
    }

    pub async fn get_production_order(
        &self,
        actor: &Actor,
        id: ProductionOrderId,
    ) -> WorkflowResult<ProductionOrder> {
        let mut tx = self.begin(actor).await?;
        let result = load_order(&mut *tx, id).await.map(|(_, o)| o);
        read(tx, result).await
    }

    pub async fn list_production_orders(&self, actor: &Actor) -> WorkflowResult<Vec<ProductionOrder>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<ProductionOrder>(&mut *tx, &Filter::all())
            .await
            .map(|v| {
                let mut orders: Vec<_> = v.into_iter().map(|o| o.value).collect();
                newest_first(&mut orders, |d| d.number.as_str());
                orders
            })
            .map_err(Into::into);
        read(tx, result).await
    }
}
