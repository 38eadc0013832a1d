//! Inventory row per (product, warehouse) and the stock operations on it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use mercato_core::{DomainError, DomainResult, Entity, TenantId};
use mercato_products::ProductId;

use crate::allocation::{self, AllocationError, BatchAllocation, BatchRequest};
use crate::movement::MovementKind;
use crate::warehouse::WarehouseId;

/// A lot of stock received together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
    pub manufactured_on: Option<NaiveDate>,
    pub received_at: DateTime<Utc>,
    pub unit_cost: u64,
}

/// Batch details supplied with inbound stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReceipt {
    pub batch_number: String,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub manufactured_on: Option<NaiveDate>,
}

/// Which quantity an outbound issue draws down.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IssueMode {
    /// Fulfils an earlier reservation: committed and on-hand both drop.
    FromCommitment,
    /// Unreserved sale: only uncommitted (available) stock may be used.
    FromAvailable,
}

/// What a single operation did to an inventory row.
///
/// `quantity` is the signed change of the counter the movement kind affects
/// (on-hand for receipts/issues/adjustments, committed for reservations,
/// on-order for expectations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockChange {
    pub kind: MovementKind,
    pub quantity: i64,
    pub unit_cost: Option<u64>,
    pub batches: Vec<BatchAllocation>,
}

/// Address of an inventory row.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InventoryKey {
    pub product_id: ProductId,
    pub warehouse_id: WarehouseId,
}

impl core::fmt::Display for InventoryKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}:{}", self.product_id, self.warehouse_id)
    }
}

/// Stock position of one product in one warehouse.
///
/// Invariants held after every successful operation:
/// `0 <= committed <= quantity`, `on_order >= 0`,
/// `sum(batches.quantity) <= quantity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRecord {
    tenant_id: TenantId,
    #[serde(flatten)]
    id: InventoryKey,
    /// On-hand quantity.
    quantity: i64,
    committed: i64,
    on_order: i64,
    /// Moving average unit cost of on-hand stock.
    average_cost: u64,
    batches: Vec<Batch>,
    updated_at: DateTime<Utc>,
}

impl InventoryRecord {
    /// A fresh, empty row (find-or-create).
    pub fn empty(
        tenant_id: TenantId,
        product_id: ProductId,
        warehouse_id: WarehouseId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tenant_id,
            id: InventoryKey {
                product_id,
                warehouse_id,
            },
            quantity: 0,
            committed: 0,
            on_order: 0,
            average_cost: 0,
            batches: Vec::new(),
            updated_at: now,
        }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn product_id(&self) -> ProductId {
        self.id.product_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.id.warehouse_id
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn committed(&self) -> i64 {
        self.committed
    }

    pub fn on_order(&self) -> i64 {
        self.on_order
    }

    /// On-hand minus committed.
    pub fn available(&self) -> i64 {
        self.quantity - self.committed
    }

    pub fn average_cost(&self) -> u64 {
        self.average_cost
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Verify the row's bookkeeping invariants.
    pub fn check_invariants(&self) -> DomainResult<()> {
        if self.committed < 0 || self.committed > self.quantity {
            return Err(DomainError::invariant(format!(
                "committed {} outside 0..={}",
                self.committed, self.quantity
            )));
        }
        if self.on_order < 0 {
            return Err(DomainError::invariant("on_order cannot be negative"));
        }
        let batched: i64 = self.batches.iter().map(|b| b.quantity).sum();
        if batched > self.quantity {
            return Err(DomainError::invariant(format!(
                "batches hold {batched} but only {} on hand",
                self.quantity
            )));
        }
        Ok(())
    }

    fn insufficient(&self, requested: i64, available: i64) -> DomainError {
        DomainError::insufficient_stock(self.id.product_id, self.id.warehouse_id, requested, available)
    }

    fn allocation_error(&self, requested: i64, err: AllocationError) -> DomainError {
        match err {
            AllocationError::Shortfall { available } => self.insufficient(requested, available),
            AllocationError::UnknownBatch(b) => {
                DomainError::validation(format!("unknown batch '{b}'"))
            }
            AllocationError::BatchShort {
                batch_number,
                requested,
                available,
            } => DomainError::validation(format!(
                "batch '{batch_number}' holds {available}, requested {requested}"
            )),
            AllocationError::SelectionMismatch { selected, required } => {
                DomainError::validation(format!(
                    "batch selection totals {selected} but {required} is required"
                ))
            }
            AllocationError::NonPositiveRequest(b) => {
                DomainError::validation(format!("batch '{b}' requested with non-positive quantity"))
            }
        }
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    /// Reserve `quantity` of available stock against an order.
    pub fn reserve(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        if self.available() < quantity {
            return Err(self.insufficient(quantity, self.available()));
        }
        self.committed += quantity;
        self.touch(now);
        Ok(change(MovementKind::Reservation, quantity))
    }

    /// Give back a reservation that will not be fulfilled.
    pub fn release(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        if self.committed < quantity {
            return Err(DomainError::invariant(format!(
                "cannot release {quantity}, only {} committed",
                self.committed
            )));
        }
        self.committed -= quantity;
        self.touch(now);
        Ok(change(MovementKind::ReservationRelease, -quantity))
    }

    /// Record stock expected from an open purchase or production order.
    pub fn expect(&mut self, quantity: i64, now: DateTime<Utc>) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        self.on_order += quantity;
        self.touch(now);
        Ok(change(MovementKind::OnOrder, quantity))
    }

    /// Drop an expectation; never takes on-order below zero.
    pub fn cancel_expected(
        &mut self,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        let reduce = quantity.min(self.on_order);
        self.on_order -= reduce;
        self.touch(now);
        Ok(change(MovementKind::OnOrderCancel, -reduce))
    }

    /// Put stock on hand.
    ///
    /// When `against_order` is set the receipt settles on-order quantity (up to
    /// what is outstanding). Batch-managed products must name a batch; a batch
    /// number already on hand is topped up and must carry the same expiry.
    #[allow(clippy::too_many_arguments)]
    pub fn receive(
        &mut self,
        kind: MovementKind,
        quantity: i64,
        unit_cost: u64,
        batch: Option<BatchReceipt>,
        against_order: bool,
        batch_managed: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        if !kind.is_inbound() {
            return Err(DomainError::invariant(format!("{kind:?} is not an inbound movement")));
        }

        let batches = match (batch_managed, batch) {
            (true, None) => {
                return Err(DomainError::validation(format!(
                    "product {} is batch managed; a batch number is required",
                    self.id.product_id
                )));
            }
            (false, Some(_)) => {
                return Err(DomainError::validation(format!(
                    "product {} is not batch managed",
                    self.id.product_id
                )));
            }
            (true, Some(receipt)) => vec![self.put_batch(receipt, quantity, unit_cost, now)?],
            (false, None) => Vec::new(),
        };

        self.average_cost = moving_average(self.quantity, self.average_cost, quantity, unit_cost);
        self.quantity += quantity;
        if against_order {
            self.on_order -= quantity.min(self.on_order);
        }
        self.touch(now);

        Ok(StockChange {
            kind,
            quantity,
            unit_cost: Some(unit_cost),
            batches,
        })
    }

    /// Take stock off hand, allocating batches for batch-managed products.
    pub fn issue(
        &mut self,
        kind: MovementKind,
        quantity: i64,
        mode: IssueMode,
        selection: &[BatchRequest],
        batch_managed: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        ensure_positive(quantity)?;
        if !kind.is_outbound() {
            return Err(DomainError::invariant(format!("{kind:?} is not an outbound movement")));
        }

        match mode {
            IssueMode::FromCommitment => {
                if self.committed < quantity {
                    return Err(DomainError::invariant(format!(
                        "cannot issue {quantity} against reservations, only {} committed",
                        self.committed
                    )));
                }
            }
            IssueMode::FromAvailable => {
                if self.available() < quantity {
                    return Err(self.insufficient(quantity, self.available()));
                }
            }
        }

        let batches = if batch_managed {
            allocation::allocate(&mut self.batches, quantity, selection)
                .map_err(|e| self.allocation_error(quantity, e))?
        } else {
            Vec::new()
        };

        self.quantity -= quantity;
        if mode == IssueMode::FromCommitment {
            self.committed -= quantity;
        }
        self.touch(now);

        Ok(StockChange {
            kind,
            quantity: -quantity,
            unit_cost: Some(self.average_cost),
            batches,
        })
    }

    /// Manual stock-count correction.
    ///
    /// The result may not drop below what is committed. Positive corrections
    /// of batch-managed products need a batch; negative ones consume batches
    /// (explicit `selection` or FEFO).
    #[allow(clippy::too_many_arguments)]
    pub fn adjust(
        &mut self,
        delta: i64,
        unit_cost: Option<u64>,
        batch: Option<BatchReceipt>,
        selection: &[BatchRequest],
        batch_managed: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<StockChange> {
        if delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        let new_quantity = self
            .quantity
            .checked_add(delta)
            .ok_or_else(|| DomainError::validation("adjustment overflows the on-hand quantity"))?;
        if new_quantity < self.committed {
            return Err(DomainError::invariant(format!(
                "adjustment would leave {new_quantity} on hand, below {} committed",
                self.committed
            )));
        }

        if !batch_managed && (batch.is_some() || !selection.is_empty()) {
            return Err(DomainError::validation(format!(
                "product {} is not batch managed",
                self.id.product_id
            )));
        }

        let cost = unit_cost.unwrap_or(self.average_cost);
        let batches = if delta > 0 {
            match (batch_managed, batch) {
                (true, None) => {
                    return Err(DomainError::validation(
                        "a batch number is required to add stock of a batch managed product",
                    ));
                }
                (true, Some(receipt)) => vec![self.put_batch(receipt, delta, cost, now)?],
                (false, _) => Vec::new(),
            }
        } else if batch_managed {
            // Untracked surplus (quantity above the batch total) is written off first.
            let untracked = self.quantity - self.batches.iter().map(|b| b.quantity).sum::<i64>();
            let from_batches = (-delta - untracked).max(0);
            if from_batches > 0 || !selection.is_empty() {
                let wanted = if selection.is_empty() { from_batches } else { -delta };
                allocation::allocate(&mut self.batches, wanted, selection)
                    .map_err(|e| self.allocation_error(wanted, e))?
            } else {
                Vec::new()
            }
        } else {
            Vec::new()
        };

        if delta > 0 {
            self.average_cost = moving_average(self.quantity, self.average_cost, delta, cost);
        }
        self.quantity = new_quantity;
        self.touch(now);

        Ok(StockChange {
            kind: MovementKind::Adjustment,
            quantity: delta,
            unit_cost: Some(cost),
            batches,
        })
    }

    fn put_batch(
        &mut self,
        receipt: BatchReceipt,
        quantity: i64,
        unit_cost: u64,
        now: DateTime<Utc>,
    ) -> DomainResult<BatchAllocation> {
        let batch_number = receipt.batch_number.trim().to_string();
        if batch_number.is_empty() {
            return Err(DomainError::validation("batch number cannot be empty"));
        }
        if let (Some(mfg), Some(exp)) = (receipt.manufactured_on, receipt.expiry_date) {
            if mfg > exp {
                return Err(DomainError::validation(format!(
                    "batch '{batch_number}' expires before it was manufactured"
                )));
            }
        }

        if let Some(existing) = self.batches.iter_mut().find(|b| b.batch_number == batch_number) {
            if existing.expiry_date != receipt.expiry_date {
                return Err(DomainError::validation(format!(
                    "batch '{batch_number}' already on hand with a different expiry date"
                )));
            }
            existing.unit_cost =
                moving_average(existing.quantity, existing.unit_cost, quantity, unit_cost);
            existing.quantity += quantity;
        } else {
            self.batches.push(Batch {
                batch_number: batch_number.clone(),
                quantity,
                expiry_date: receipt.expiry_date,
                manufactured_on: receipt.manufactured_on,
                received_at: now,
                unit_cost,
            });
        }

        Ok(BatchAllocation {
            batch_number,
            quantity,
            expiry_date: receipt.expiry_date,
        })
    }
}

impl Entity for InventoryRecord {
    type Id = InventoryKey;
    const COLLECTION: &'static str = "inventory";

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn key(&self) -> String {
        self.id.to_string()
    }
}

fn ensure_positive(quantity: i64) -> DomainResult<()> {
    if quantity <= 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    Ok(())
}

fn change(kind: MovementKind, quantity: i64) -> StockChange {
    StockChange {
        kind,
        quantity,
        unit_cost: None,
        batches: Vec::new(),
    }
}

/// Weighted average of existing stock and an inbound lot, rounded half-up.
fn moving_average(on_hand: i64, current_cost: u64, inbound: i64, inbound_cost: u64) -> u64 {
    let on_hand = on_hand.max(0) as u128;
    let inbound = inbound.max(0) as u128;
    let total = on_hand + inbound;
    if total == 0 {
        return inbound_cost;
    }
    let value = on_hand * current_cost as u128 + inbound * inbound_cost as u128;
    ((value + total / 2) / total) as u64
}
