//! Batch/lot allocation for outbound stock.
//!
//! Without an explicit selection, batches are consumed first-expired-first-out:
//! earliest expiry first, undated batches last, ties broken by receipt time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::record::Batch;

/// Caller-chosen quantity from a specific batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub batch_number: String,
    pub quantity: i64,
}

/// Quantity taken from (or put into) one batch by a stock operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchAllocation {
    pub batch_number: String,
    pub quantity: i64,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AllocationError {
    /// Batches cannot cover the requested quantity.
    Shortfall { available: i64 },
    UnknownBatch(String),
    BatchShort {
        batch_number: String,
        requested: i64,
        available: i64,
    },
    SelectionMismatch { selected: i64, required: i64 },
    NonPositiveRequest(String),
}

/// Take `quantity` out of `batches`, honouring `selection` when it is not empty.
///
/// On error `batches` is left untouched. Emptied batches are removed.
pub(crate) fn allocate(
    batches: &mut Vec<Batch>,
    quantity: i64,
    selection: &[BatchRequest],
) -> Result<Vec<BatchAllocation>, AllocationError> {
    let plan = if selection.is_empty() {
        plan_fefo(batches, quantity)?
    } else {
        plan_explicit(batches, quantity, selection)?
    };

    let mut allocations = Vec::with_capacity(plan.len());
    for (idx, take) in plan {
        let batch = &mut batches[idx];
        batch.quantity -= take;
        allocations.push(BatchAllocation {
            batch_number: batch.batch_number.clone(),
            quantity: take,
            expiry_date: batch.expiry_date,
        });
    }
    batches.retain(|b| b.quantity > 0);

    Ok(allocations)
}

fn plan_fefo(batches: &[Batch], quantity: i64) -> Result<Vec<(usize, i64)>, AllocationError> {
    let total: i64 = batches.iter().map(|b| b.quantity).sum();
    if total < quantity {
        return Err(AllocationError::Shortfall { available: total });
    }

    let mut order: Vec<usize> = (0..batches.len()).collect();
    order.sort_by(|&a, &b| {
        let (ba, bb) = (&batches[a], &batches[b]);
        // `None` sorts after every date.
        let ea = ba.expiry_date.map_or((1, NaiveDate::MAX), |d| (0, d));
        let eb = bb.expiry_date.map_or((1, NaiveDate::MAX), |d| (0, d));
        ea.cmp(&eb).then(ba.received_at.cmp(&bb.received_at))
    });

    let mut remaining = quantity;
    let mut plan = Vec::new();
    for idx in order {
        if remaining == 0 {
            break;
        }
        let take = batches[idx].quantity.min(remaining);
        if take > 0 {
            plan.push((idx, take));
            remaining -= take;
        }
    }
    Ok(plan)
}

fn plan_explicit(
    batches: &[Batch],
    quantity: i64,
    selection: &[BatchRequest],
) -> Result<Vec<(usize, i64)>, AllocationError> {
    let selected: i64 = selection.iter().map(|r| r.quantity).sum();
    if selected != quantity {
        return Err(AllocationError::SelectionMismatch {
            selected,
            required: quantity,
        });
    }

    let mut plan: Vec<(usize, i64)> = Vec::with_capacity(selection.len());
    for req in selection {
        if req.quantity <= 0 {
            return Err(AllocationError::NonPositiveRequest(req.batch_number.clone()));
        }
        let idx = batches
            .iter()
            .position(|b| b.batch_number == req.batch_number)
            .ok_or_else(|| AllocationError::UnknownBatch(req.batch_number.clone()))?;

        // The same batch may be named twice; check against the running total.
        let already: i64 = plan.iter().filter(|(i, _)| *i == idx).map(|(_, q)| q).sum();
        if already + req.quantity > batches[idx].quantity {
            return Err(AllocationError::BatchShort {
                batch_number: req.batch_number.clone(),
                requested: already + req.quantity,
                available: batches[idx].quantity,
            });
        }
        plan.push((idx, req.quantity));
    }
    Ok(plan)
}
