//! Sales orders: reserve on create, issue on delivery, release on cancel.

use chrono::Utc;

use mercato_core::{DocumentKind, DomainError};
use mercato_inventory::{IssueMode, MovementKind, MovementReference};
use mercato_parties::PartyKind;
use mercato_pricing::resolve_line_price;
use mercato_sales::{
    DeliveryLine, DeliveryRequest, NewSalesOrder, OrderLineDraft, SalesOrder, SalesOrderId,
};

use crate::store::{Filter, StoreTx, typed};

use super::masters::load_party;
use super::pricing::customer_price_list;
use super::{Actor, StockLedger, WorkflowResult, Workflows, committed, finish, newest_first, read};

async fn load_order(tx: &mut dyn StoreTx, id: SalesOrderId) -> WorkflowResult<(u64, SalesOrder)> {
    let v = typed::load::<SalesOrder>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("sales order {id}")))?;
    Ok((v.version, v.value))
}

fn reference(order: &SalesOrder) -> MovementReference {
    MovementReference::new(DocumentKind::SalesOrder, order.id.document_id(), order.number.clone())
}

impl Workflows {
    /// Number the order and reserve every line, all or nothing.
    pub async fn create_sales_order(&self, actor: &Actor, input: NewSalesOrder) -> WorkflowResult<SalesOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let customer = load_party(&mut *tx, input.customer_id, PartyKind::Customer).await?.1;
            customer.ensure_counterparty(PartyKind::Customer)?;
            let price_list = customer_price_list(&mut *tx, Some(&customer)).await?;

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let order_date = input.order_date.unwrap_or_else(|| now.date_naive());

            let mut drafts = Vec::with_capacity(input.lines.len());
            for line in &input.lines {
                let product = ledger.product(&mut *tx, line.product_id).await?;
                product.ensure_transactable()?;
                ledger.warehouse(&mut *tx, line.warehouse_id).await?;
                let price = resolve_line_price(
                    line.unit_price,
                    price_list.as_ref(),
                    &product,
                    line.quantity,
                    order_date,
                )?;
                drafts.push(OrderLineDraft {
                    product_id: line.product_id,
                    warehouse_id: line.warehouse_id,
                    quantity: line.quantity,
                    unit_price: price.unit_price,
                    price_source: price.source,
                    discount_bp: line.discount_bp,
                    tax_bp: line.tax_bp,
                });
            }

            let number = self.next_number(&mut *tx, DocumentKind::SalesOrder).await?;
            let order = SalesOrder::open(
                actor.tenant_id,
                SalesOrderId::new(),
                number,
                customer.id,
                order_date,
                drafts,
                input.notes,
                actor.user_id,
                now,
            )?;

            let reference = reference(&order);
            for line in &order.lines {
                ledger
                    .apply(&mut *tx, line.product_id, line.warehouse_id, Some(&reference), None, |row, _| {
                        row.reserve(line.quantity, now)
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::insert(&mut *tx, &order).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "sales_order.create").await?;
        committed("sales_order.create", actor, &order.number);
        Ok(order)
    }

    /// Ship the requested quantities (everything outstanding when `requests` is empty).
    pub async fn deliver_sales_order(
        &self,
        actor: &Actor,
        id: SalesOrderId,
        requests: &[DeliveryRequest],
    ) -> WorkflowResult<SalesOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            let plan = order.plan_delivery(requests)?;
            if plan.is_empty() {
                return Err(DomainError::validation("nothing left to deliver").into());
            }

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let reference = reference(&order);
            let mut delivered = Vec::with_capacity(plan.len());
            for issue in &plan {
                let change = ledger
                    .apply(&mut *tx, issue.product_id, issue.warehouse_id, Some(&reference), None, |row, product| {
                        row.issue(
                            MovementKind::Issue,
                            issue.quantity,
                            IssueMode::FromCommitment,
                            &issue.batches,
                            product.batch_managed,
                            now,
                        )
                    })
                    .await?;
                delivered.push(DeliveryLine {
                    line_no: issue.line_no,
                    quantity: issue.quantity,
                    allocations: change.batches,
                });
            }

            order.record_delivery(delivered, actor.user_id, now)?;
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "sales_order.deliver").await?;
        committed("sales_order.deliver", actor, &order.number);
        Ok(order)
    }

    /// Cancel and release whatever is still reserved.
    pub async fn cancel_sales_order(&self, actor: &Actor, id: SalesOrderId) -> WorkflowResult<SalesOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let outstanding = order.cancel(now)?;
            let reference = reference(&order);
            for line in &outstanding {
                ledger
                    .apply(&mut *tx, line.product_id, line.warehouse_id, Some(&reference), None, |row, _| {
                        row.release(line.quantity, now)
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "sales_order.cancel").await?;
        committed("sales_order.cancel", actor, &order.number);
        Ok(order)
    }

    pub async fn get_sales_order(&self, actor: &Actor, id: SalesOrderId) -> WorkflowResult<SalesOrder> {
        let mut tx = self.begin(actor).await?;
        let result = load_order(&mut *tx, id).await.map(|(_, o)| o);
        read(tx, result).await
    }

    /// Newest first.
    pub async fn list_sales_orders(&self, actor: &Actor) -> WorkflowResult<Vec<SalesOrder>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<SalesOrder>(&mut *tx, &Filter::all())
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::WorkflowError;
    use crate::workflows::inventory::StockQuery;
    use crate::workflows::masters::PartyChanges;
    use crate::workflows::testing::{Fixture, date};
    use mercato_inventory::{BatchRequest, WarehouseId};
    use mercato_products::ProductId;
    use mercato_sales::{NewSalesOrderLine, SalesOrderStatus};

    fn line(product_id: ProductId, warehouse_id: WarehouseId, quantity: i64) -> NewSalesOrderLine {
        NewSalesOrderLine {
            product_id,
            warehouse_id,
            quantity,
            unit_price: None,
            discount_bp: 0,
            tax_bp: 0,
        }
    }

    fn order(customer: &mercato_parties::Party, lines: Vec<NewSalesOrderLine>) -> NewSalesOrder {
        NewSalesOrder {
            customer_id: customer.id,
            order_date: None,
            lines,
            notes: None,
        }
    }

    #[tokio::test]
    async fn create_commits_stock_and_delivery_issues_it() {
        let fx = Fixture::new();
        let p = fx.product("P-1", false, Some(1_000)).await;
        let w = fx.warehouse("MAIN").await;
        let c = fx.customer("Acme").await;
        fx.stock(p.id, w.id, 10).await;

        let so = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(p.id, w.id, 4)]))
            .await
            .unwrap();
        assert_eq!(so.number, "SO-00001");
        assert_eq!(so.totals.total, 4_000);

        let row = fx.row(p.id, w.id).await;
        assert_eq!(row.quantity(), 10);
        assert_eq!(row.committed(), 4);
        assert_eq!(row.available(), 6);

        let so = fx.wf.deliver_sales_order(&fx.actor, so.id, &[]).await.unwrap();
        assert_eq!(so.status, SalesOrderStatus::Delivered);
        let row = fx.row(p.id, w.id).await;
        assert_eq!(row.quantity(), 6);
        assert_eq!(row.committed(), 0);

        let kinds: Vec<MovementKind> = fx
            .wf
            .list_movements(&fx.actor, StockQuery::default())
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![MovementKind::Adjustment, MovementKind::Reservation, MovementKind::Issue]
        );
    }

    #[tokio::test]
    async fn insufficient_stock_rolls_back_the_whole_order() {
        let fx = Fixture::new();
        let a = fx.product("A", false, Some(10)).await;
        let b = fx.product("B", false, Some(10)).await;
        let w = fx.warehouse("MAIN").await;
        let c = fx.customer("Acme").await;
        fx.stock(a.id, w.id, 5).await;
        fx.stock(b.id, w.id, 1).await;

        let err = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(a.id, w.id, 5), line(b.id, w.id, 2)]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InsufficientStock { .. })));
        assert_eq!(fx.row(a.id, w.id).await.committed(), 0);
        assert!(fx.wf.list_sales_orders(&fx.actor).await.unwrap().is_empty());

        // The failed attempt did not consume a number.
        let so = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(a.id, w.id, 1)]))
            .await
            .unwrap();
        assert_eq!(so.number, "SO-00001");
    }

    #[tokio::test]
    async fn partial_delivery_then_cancel_releases_the_rest() {
        let fx = Fixture::new();
        let p = fx.product("P-1", false, Some(100)).await;
        let w = fx.warehouse("MAIN").await;
        let c = fx.customer("Acme").await;
        fx.stock(p.id, w.id, 10).await;

        let so = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(p.id, w.id, 6)]))
            .await
            .unwrap();
        let so = fx
            .wf
            .deliver_sales_order(
                &fx.actor,
                so.id,
                &[DeliveryRequest {
                    line_no: 1,
                    quantity: 2,
                    batches: vec![],
                }],
            )
            .await
            .unwrap();
        assert_eq!(so.status, SalesOrderStatus::PartiallyDelivered);
        assert_eq!(fx.row(p.id, w.id).await.committed(), 4);

        let so = fx.wf.cancel_sales_order(&fx.actor, so.id).await.unwrap();
        assert_eq!(so.status, SalesOrderStatus::Cancelled);
        let row = fx.row(p.id, w.id).await;
        assert_eq!(row.quantity(), 8);
        assert_eq!(row.committed(), 0);

        let err = fx.wf.deliver_sales_order(&fx.actor, so.id, &[]).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InvariantViolation(_))));
    }

    #[tokio::test]
    async fn delivery_allocates_batches_fefo_or_as_selected() {
        let fx = Fixture::new();
        let p = fx.product("MED", true, Some(50)).await;
        let w = fx.warehouse("MAIN").await;
        let c = fx.customer("Clinic").await;
        fx.stock_batch(p.id, w.id, 5, "LATE", Some(date(2031, 1, 1))).await;
        fx.stock_batch(p.id, w.id, 5, "EARLY", Some(date(2030, 1, 1))).await;

        let so = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(p.id, w.id, 7)]))
            .await
            .unwrap();
        let so = fx
            .wf
            .deliver_sales_order(
                &fx.actor,
                so.id,
                &[DeliveryRequest {
                    line_no: 1,
                    quantity: 6,
                    batches: vec![],
                }],
            )
            .await
            .unwrap();
        let taken: Vec<(String, i64)> = so.deliveries[0].lines[0]
            .allocations
            .iter()
            .map(|a| (a.batch_number.clone(), a.quantity))
            .collect();
        assert_eq!(taken, vec![("EARLY".to_string(), 5), ("LATE".to_string(), 1)]);

        let so = fx
            .wf
            .deliver_sales_order(
                &fx.actor,
                so.id,
                &[DeliveryRequest {
                    line_no: 1,
                    quantity: 1,
                    batches: vec![BatchRequest {
                        batch_number: "LATE".into(),
                        quantity: 1,
                    }],
                }],
            )
            .await
            .unwrap();
        assert_eq!(so.status, SalesOrderStatus::Delivered);
        let row = fx.row(p.id, w.id).await;
        assert_eq!(row.quantity(), 3);
        assert_eq!(row.batches().len(), 1);
        assert_eq!(row.batches()[0].quantity, 3);
    }

    #[tokio::test]
    async fn suspended_customer_cannot_order() {
        let fx = Fixture::new();
        let p = fx.product("P-1", false, Some(100)).await;
        let w = fx.warehouse("MAIN").await;
        let c = fx.customer("Acme").await;
        fx.stock(p.id, w.id, 10).await;
        fx.wf
            .update_party(
                &fx.actor,
                PartyKind::Customer,
                c.id,
                PartyChanges {
                    active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = fx
            .wf
            .create_sales_order(&fx.actor, order(&c, vec![line(p.id, w.id, 1)]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Validation(_))));
    }
}
