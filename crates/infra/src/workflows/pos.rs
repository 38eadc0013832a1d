//! Counter sales: price, issue from available stock and record payment at once.

use chrono::Utc;

use mercato_core::{DocumentKind, DomainError};
use mercato_inventory::{IssueMode, MovementKind, MovementReference};
use mercato_parties::PartyKind;
use mercato_pos::{NewPosSale, PosLineDraft, PosSale, PosSaleId};
use mercato_pricing::resolve_line_price;

use crate::store::{Filter, StoreTx, typed};

use super::masters::load_party;
use super::pricing::customer_price_list;
use super::{Actor, StockLedger, WorkflowResult, Workflows, committed, finish, newest_first, read};

async fn load_sale(tx: &mut dyn StoreTx, id: PosSaleId) -> WorkflowResult<PosSale> {
    Ok(typed::load::<PosSale>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("POS sale {id}")))?
        .value)
}

impl Workflows {
    pub async fn create_pos_sale(&self, actor: &Actor, input: NewPosSale) -> WorkflowResult<PosSale> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let customer = match input.customer_id {
                Some(id) => {
                    let customer = load_party(&mut *tx, id, PartyKind::Customer).await?.1;
                    customer.ensure_counterparty(PartyKind::Customer)?;
                    Some(customer)
                }
                None => None,
            };
            let price_list = customer_price_list(&mut *tx, customer.as_ref()).await?;

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            ledger.warehouse(&mut *tx, input.warehouse_id).await?;

            let mut drafts = Vec::with_capacity(input.lines.len());
            for line in &input.lines {
                let product = ledger.product(&mut *tx, line.product_id).await?;
                product.ensure_transactable()?;
                let price = resolve_line_price(
                    line.unit_price,
                    price_list.as_ref(),
                    &product,
                    line.quantity,
                    now.date_naive(),
                )?;
                drafts.push(PosLineDraft {
                    product_id: line.product_id,
                    quantity: line.quantity,
                    unit_price: price.unit_price,
                    price_source: price.source,
                    discount_bp: line.discount_bp,
                    tax_bp: line.tax_bp,
                });
            }

            let number = self.next_number(&mut *tx, DocumentKind::PosSale).await?;
            let mut sale = PosSale::create(
                actor.tenant_id,
                PosSaleId::new(),
                number,
                input.customer_id,
                input.warehouse_id,
                drafts,
                input.payments,
                actor.user_id,
                now,
            )?;

            let reference =
                MovementReference::new(DocumentKind::PosSale, sale.id.document_id(), sale.number.clone());
            let warehouse_id = sale.warehouse_id;
            for (line, requested) in sale.lines.iter_mut().zip(&input.lines) {
                let quantity = line.quantity;
                let change = ledger
                    .apply(&mut *tx, line.product_id, warehouse_id, Some(&reference), None, |row, product| {
                        row.issue(
                            MovementKind::PosSale,
                            quantity,
                            IssueMode::FromAvailable,
                            &requested.batches,
                            product.batch_managed,
                            now,
                        )
                    })
                    .await?;
                line.allocations = change.batches;
            }
            ledger.flush(&mut *tx).await?;
            typed::insert(&mut *tx, &sale).await?;
            Ok(sale)
        }
        .await;
        let sale = finish(tx, result, "pos_sale.create").await?;
        committed("pos_sale.create", actor, &sale.number);
        Ok(sale)
    }

    pub async fn get_pos_sale(&self, actor: &Actor, id: PosSaleId) -> WorkflowResult<PosSale> {
        let mut tx = self.begin(actor).await?;
        let result = load_sale(&mut *tx, id).await;
        read(tx, result).await
    }

    pub async fn list_pos_sales(&self, actor: &Actor) -> WorkflowResult<Vec<PosSale>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<PosSale>(&mut *tx, &Filter::all())
            .await
            .map(|v| {
                let mut sales: Vec<_> = v.into_iter().map(|s| s.value).collect();
                newest_first(&mut sales, |d| d.number.as_str());
                sales
            })
            .map_err(Into::into);
        read(tx, result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::WorkflowError;
    use crate::workflows::testing::{Fixture, date};
    use mercato_pos::{NewPosLine, Payment, PaymentMethod};
    use mercato_products::ProductId;

    fn cash(amount: u64) -> Payment {
        Payment {
            method: PaymentMethod::Cash,
            amount,
            reference: None,
        }
    }

    fn line(product_id: ProductId, quantity: i64) -> NewPosLine {
        NewPosLine {
            product_id,
            quantity,
            unit_price: None,
            discount_bp: 0,
            tax_bp: 0,
            batches: vec![],
        }
    }

    #[tokio::test]
    async fn sale_issues_from_available_stock_and_gives_change() {
        let fx = Fixture::new();
        let w = fx.warehouse("SHOP").await;
        let p = fx.product("SOAP", false, Some(250)).await;
        fx.stock(p.id, w.id, 10).await;

        let sale = fx
            .wf
            .create_pos_sale(
                &fx.actor,
                NewPosSale {
                    customer_id: None,
                    warehouse_id: w.id,
                    lines: vec![line(p.id, 3)],
                    payments: vec![cash(1_000)],
                },
            )
            .await
            .unwrap();
        assert_eq!(sale.number, "POS-00001");
        assert_eq!(sale.totals.total, 750);
        assert_eq!(sale.change_due, 250);
        assert_eq!(fx.row(p.id, w.id).await.quantity(), 7);
    }

    #[tokio::test]
    async fn reserved_stock_is_not_sold_over_the_counter() {
        let fx = Fixture::new();
        let w = fx.warehouse("SHOP").await;
        let p = fx.product("SOAP", false, Some(100)).await;
        let c = fx.customer("Acme").await;
        fx.stock(p.id, w.id, 5).await;
        fx.wf
            .create_sales_order(
                &fx.actor,
                mercato_sales::NewSalesOrder {
                    customer_id: c.id,
                    order_date: None,
                    lines: vec![mercato_sales::NewSalesOrderLine {
                        product_id: p.id,
                        warehouse_id: w.id,
                        quantity: 4,
                        unit_price: None,
                        discount_bp: 0,
                        tax_bp: 0,
                    }],
                    notes: None,
                },
            )
            .await
            .unwrap();

        let err = fx
            .wf
            .create_pos_sale(
                &fx.actor,
                NewPosSale {
                    customer_id: None,
                    warehouse_id: w.id,
                    lines: vec![line(p.id, 2)],
                    payments: vec![cash(200)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::InsufficientStock { .. })));
        assert_eq!(fx.row(p.id, w.id).await.quantity(), 5);
    }

    #[tokio::test]
    async fn underpayment_is_rejected_before_stock_moves() {
        let fx = Fixture::new();
        let w = fx.warehouse("SHOP").await;
        let p = fx.product("SOAP", false, Some(100)).await;
        fx.stock(p.id, w.id, 5).await;

        let err = fx
            .wf
            .create_pos_sale(
                &fx.actor,
                NewPosSale {
                    customer_id: None,
                    warehouse_id: w.id,
                    lines: vec![line(p.id, 2)],
                    payments: vec![cash(150)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WorkflowError::Domain(DomainError::Validation(_))));
        assert_eq!(fx.row(p.id, w.id).await.quantity(), 5);
    }

    #[tokio::test]
    async fn batch_products_are_sold_fefo() {
        let fx = Fixture::new();
        let w = fx.warehouse("SHOP").await;
        let p = fx.product("MILK", true, Some(60)).await;
        fx.stock_batch(p.id, w.id, 2, "B2", Some(date(2030, 2, 1))).await;
        fx.stock_batch(p.id, w.id, 2, "B1", Some(date(2030, 1, 1))).await;

        let sale = fx
            .wf
            .create_pos_sale(
                &fx.actor,
                NewPosSale {
                    customer_id: None,
                    warehouse_id: w.id,
                    lines: vec![line(p.id, 3)],
                    payments: vec![cash(180)],
                },
            )
            .await
            .unwrap();
        let taken: Vec<&str> = sale.lines[0]
            .allocations
            .iter()
            .map(|a| a.batch_number.as_str())
            .collect();
        assert_eq!(taken, vec!["B1", "B2"]);
    }
}
