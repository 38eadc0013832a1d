//! Purchase orders (on-order bookkeeping) and supplier invoice posting.

use chrono::Utc;

use mercato_core::{DocumentKind, DomainError};
use mercato_inventory::{MovementKind, MovementReference};
use mercato_parties::PartyKind;
use mercato_purchasing::{
    NewPurchaseInvoice, NewPurchaseOrder, PurchaseInvoice, PurchaseInvoiceId, PurchaseOrder,
    PurchaseOrderId, normalize_reference,
};

use crate::store::{Filter, StoreTx, typed};

use super::masters::load_party;
use super::{Actor, StockLedger, WorkflowResult, Workflows, committed, finish, newest_first, read, unique};

async fn load_order(tx: &mut dyn StoreTx, id: PurchaseOrderId) -> WorkflowResult<(u64, PurchaseOrder)> {
    let v = typed::load::<PurchaseOrder>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("purchase order {id}")))?;
    Ok((v.version, v.value))
}

async fn load_invoice(tx: &mut dyn StoreTx, id: PurchaseInvoiceId) -> WorkflowResult<PurchaseInvoice> {
    Ok(typed::load::<PurchaseInvoice>(tx, &id.to_string())
        .await?
        .ok_or_else(|| DomainError::not_found(format!("purchase invoice {id}")))?
        .value)
}

fn order_reference(order: &PurchaseOrder) -> MovementReference {
    MovementReference::new(DocumentKind::PurchaseOrder, order.id.document_id(), order.number.clone())
}

impl Workflows {
    /// Create the order and book every line as on-order.
    pub async fn create_purchase_order(
        &self,
        actor: &Actor,
        input: NewPurchaseOrder,
    ) -> WorkflowResult<PurchaseOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let supplier = load_party(&mut *tx, input.supplier_id, PartyKind::Supplier).await?.1;
            supplier.ensure_counterparty(PartyKind::Supplier)?;

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            for line in &input.lines {
                ledger.product(&mut *tx, line.product_id).await?.ensure_transactable()?;
                ledger.warehouse(&mut *tx, line.warehouse_id).await?;
            }

            let number = self.next_number(&mut *tx, DocumentKind::PurchaseOrder).await?;
            let order_date = input.order_date.unwrap_or_else(|| now.date_naive());
            let order = PurchaseOrder::create(
                actor.tenant_id,
                PurchaseOrderId::new(),
                number,
                order_date,
                input,
                actor.user_id,
                now,
            )?;

            let reference = order_reference(&order);
            for line in &order.lines {
                ledger
                    .apply(&mut *tx, line.product_id, line.warehouse_id, Some(&reference), None, |row, _| {
                        row.expect(line.quantity, now)
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::insert(&mut *tx, &order).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "purchase_order.create").await?;
        committed("purchase_order.create", actor, &order.number);
        Ok(order)
    }

    /// Cancel and drop whatever is still on order.
    pub async fn cancel_purchase_order(
        &self,
        actor: &Actor,
        id: PurchaseOrderId,
    ) -> WorkflowResult<PurchaseOrder> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let (version, mut order) = load_order(&mut *tx, id).await?;
            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            let unreceived = order.cancel(now)?;
            let reference = order_reference(&order);
            for line in &unreceived {
                ledger
                    .apply(&mut *tx, line.product_id, line.warehouse_id, Some(&reference), None, |row, _| {
                        row.cancel_expected(line.quantity, now)
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::save(&mut *tx, &order, version).await?;
            Ok(order)
        }
        .await;
        let order = finish(tx, result, "purchase_order.cancel").await?;
        committed("purchase_order.cancel", actor, &order.number);
        Ok(order)
    }

    pub async fn get_purchase_order(&self, actor: &Actor, id: PurchaseOrderId) -> WorkflowResult<PurchaseOrder> {
        let mut tx = self.begin(actor).await?;
        let result = load_order(&mut *tx, id).await.map(|(_, o)| o);
        read(tx, result).await
    }

    pub async fn list_purchase_orders(&self, actor: &Actor) -> WorkflowResult<Vec<PurchaseOrder>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<PurchaseOrder>(&mut *tx, &Filter::all())
            .await
            .map(|v| {
                let mut orders: Vec<_> = v.into_iter().map(|o| o.value).collect();
                newest_first(&mut orders, |d| d.number.as_str());
                orders
            })
            .map_err(Into::into);
        read(tx, result).await
    }

    /// Post a supplier invoice: receive every line into stock and, when the
    /// invoice names a purchase order, settle the matching order lines.
    pub async fn post_purchase_invoice(
        &self,
        actor: &Actor,
        input: NewPurchaseInvoice,
    ) -> WorkflowResult<PurchaseInvoice> {
        let mut tx = self.begin(actor).await?;
        let result: WorkflowResult<_> = async {
            let supplier = load_party(&mut *tx, input.supplier_id, PartyKind::Supplier).await?.1;
            supplier.ensure_counterparty(PartyKind::Supplier)?;

            let mut ledger = StockLedger::new(actor.user_id, Utc::now());
            let now = ledger.now();
            for line in &input.lines {
                ledger.product(&mut *tx, line.product_id).await?.ensure_transactable()?;
                ledger.warehouse(&mut *tx, line.warehouse_id).await?;
            }

            let number = self.next_number(&mut *tx, DocumentKind::PurchaseInvoice).await?;
            let invoice_date = input.invoice_date.unwrap_or_else(|| now.date_naive());
            let mut invoice = PurchaseInvoice::create(
                actor.tenant_id,
                PurchaseInvoiceId::new(),
                number,
                invoice_date,
                input,
                actor.user_id,
                now,
            )?;
            unique::claim(
                &mut *tx,
                &format!("supplier_ref:{}", supplier.id),
                &normalize_reference(&invoice.supplier_reference),
                &invoice.id.to_string(),
                "supplier reference",
            )
            .await?;

            if let Some(po_id) = invoice.purchase_order_id {
                let (version, mut order) = load_order(&mut *tx, po_id).await?;
                order.apply_invoice(&mut invoice, now)?;
                typed::save(&mut *tx, &order, version).await?;
            }

            let reference = MovementReference::new(
                DocumentKind::PurchaseInvoice,
                invoice.id.document_id(),
                invoice.number.clone(),
            );
            for line in &invoice.lines {
                let against_order = line.po_line_no.is_some();
                let unit_cost = line.landed_unit_cost();
                ledger
                    .apply(&mut *tx, line.product_id, line.warehouse_id, Some(&reference), None, |row, product| {
                        row.receive(
                            MovementKind::Receipt,
                            line.quantity,
                            unit_cost,
                            line.batch.clone(),
                            against_order,
                            product.batch_managed,
                            now,
                        )
                    })
                    .await?;
            }
            ledger.flush(&mut *tx).await?;
            typed::insert(&mut *tx, &invoice).await?;
            Ok(invoice)
        }
        .await;
        let invoice = finish(tx, result, "purchase_invoice.post").await?;
        committed("purchase_invoice.post", actor, &invoice.number);
        Ok(invoice)
    }

    pub async fn get_purchase_invoice(
        &self,
        actor: &Actor,
        id: PurchaseInvoiceId,
    ) -> WorkflowResult<PurchaseInvoice> {
        let mut tx = self.begin(actor).await?;
        let result = load_invoice(&mut *tx, id).await;
        read(tx, result).await
    }

    pub async fn list_purchase_invoices(&self, actor: &Actor) -> WorkflowResult<Vec<PurchaseInvoice>> {
        let mut tx = self.begin(actor).await?;
        let result = typed::find::<PurchaseInvoice>(&mut *tx, &Filter::all())
            .await
            .map(|v| {
                let mut invoices: Vec<_> = v.into_iter().map(|i| i.value).collect();
                newest_first(&mut invoices, |d| d.number.as_str());
                invoices
            })
            .map_err(Into::into);
        read(tx, result).await
    }
}
