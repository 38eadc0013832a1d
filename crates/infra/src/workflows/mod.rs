//! Transactional business workflows (application-level orchestration).
//!
//! Every operation follows the same shape:
//!
//! ```text
//! begin tx (tenant-scoped)
//!   ↓
//! load documents (with versions)
//!   ↓
//! apply pure domain operations
//!   ↓
//! stage writes (optimistic versions, counters, stock movements)
//!   ↓
//! commit, or abort on the first error
//! ```
//!
//! Nothing is retried here; a `Conflict` is returned to the caller.

mod ledger;
pub mod helpdesk;
pub mod inventory;
pub mod masters;
pub mod pos;
pub mod pricing;
pub mod production;
pub mod purchasing;
pub mod sales;
mod unique;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use mercato_core::numbering::{DEFAULT_NUMBER_WIDTH, document_sequence};
use mercato_core::{DocumentKind, DomainError, TenantId, UserId};

use crate::numbering;
use crate::store::{DocumentStore, StoreError, StoreTx};

pub use ledger::StockLedger;

/// Who is acting, and for which tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub tenant_id: TenantId,
    pub user_id: UserId,
}

impl Actor {
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self { tenant_id, user_id }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl WorkflowError {
    pub fn not_found(what: impl Into<String>) -> Self {
        WorkflowError::Domain(DomainError::not_found(what))
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// Zero-padding of document numbers.
    pub number_width: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            number_width: DEFAULT_NUMBER_WIDTH,
        }
    }
}

/// Entry point for all business operations over one document store.
#[derive(Clone)]
pub struct Workflows {
    store: Arc<dyn DocumentStore>,
    config: WorkflowConfig,
}

impl core::fmt::Debug for Workflows {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Workflows")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Workflows {
    pub fn new(store: Arc<dyn DocumentStore>, config: WorkflowConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> WorkflowConfig {
        self.config
    }

    async fn begin(&self, actor: &Actor) -> WorkflowResult<Box<dyn StoreTx>> {
        Ok(self.store.begin(actor.tenant_id).await?)
    }

    async fn next_number(&self, tx: &mut dyn StoreTx, kind: DocumentKind) -> WorkflowResult<String> {
        Ok(numbering::next_number(tx, kind, self.config.number_width).await?)
    }
}

/// Commit on success, abort on failure. The original error wins over an abort failure.
async fn finish<T>(
    tx: Box<dyn StoreTx>,
    result: WorkflowResult<T>,
    operation: &'static str,
) -> WorkflowResult<T> {
    let tenant_id = tx.tenant_id();
    match result {
        Ok(value) => match tx.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                warn!(operation, tenant = %tenant_id, error = %e, "commit failed");
                Err(e.into())
            }
        },
        Err(err) => {
            if let Err(abort_err) = tx.abort().await {
                warn!(operation, tenant = %tenant_id, error = %abort_err, "abort failed");
            }
            warn!(operation, tenant = %tenant_id, error = %err, "transaction aborted");
            Err(err)
        }
    }
}

/// Read-only transaction: always aborted.
async fn read<T>(tx: Box<dyn StoreTx>, result: WorkflowResult<T>) -> WorkflowResult<T> {
    let tenant_id = tx.tenant_id();
    if let Err(e) = tx.abort().await {
        warn!(tenant = %tenant_id, error = %e, "read transaction abort failed");
    }
    result
}

/// Newest first by sequence; the padded text alone misorders once a counter
/// outgrows its width.
fn newest_first<T>(docs: &mut [T], number: impl Fn(&T) -> &str) {
    docs.sort_by(|a, b| {
        let (a, b) = (number(a), number(b));
        document_sequence(b)
            .cmp(&document_sequence(a))
            .then_with(|| b.cmp(a))
    });
}

fn committed(operation: &'static str, actor: &Actor, number: &str) {
    info!(operation, tenant = %actor.tenant_id, user = %actor.user_id, number, "committed");
}

#[cfg(test)]
pub(crate) mod testing;
