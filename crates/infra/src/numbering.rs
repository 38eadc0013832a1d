//! Document number allocation through per-tenant counter documents.
//!
//! The counter is incremented inside the caller's transaction, so a number is
//! consumed only when the document it was issued for commits.

use serde::{Deserialize, Serialize};

use mercato_core::numbering::format_document_number;
use mercato_core::{DocumentKind, ExpectedVersion};

use crate::store::{StoreError, StoreTx};

pub const COUNTERS: &str = "counters";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct Counter {
    kind: DocumentKind,
    seq: u64,
}

/// Allocate the next number for `kind`, e.g. `SO-00042`.
pub async fn next_number(
    tx: &mut dyn StoreTx,
    kind: DocumentKind,
    width: usize,
) -> Result<String, StoreError> {
    let key = kind.counter_key();
    let (seq, expected) = match tx.get(COUNTERS, key).await? {
        Some(doc) => {
            let counter: Counter = serde_json::from_value(doc.body)
                .map_err(|e| StoreError::Serialization(format!("{COUNTERS}/{key}: {e}")))?;
            (counter.seq + 1, ExpectedVersion::Exact(doc.version))
        }
        None => (1, ExpectedVersion::Absent),
    };

    let body = serde_json::to_value(Counter { kind, seq })
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    tx.put(COUNTERS, key, body, expected).await?;

    Ok(format_document_number(kind, seq, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, InMemoryDocumentStore};
    use mercato_core::TenantId;

    #[tokio::test]
    async fn numbers_are_sequential_per_kind() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin(tenant).await.unwrap();
        assert_eq!(next_number(&mut *tx, DocumentKind::SalesOrder, 5).await.unwrap(), "SO-00001");
        assert_eq!(next_number(&mut *tx, DocumentKind::SalesOrder, 5).await.unwrap(), "SO-00002");
        assert_eq!(next_number(&mut *tx, DocumentKind::PurchaseOrder, 4).await.unwrap(), "PO-0001");
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn aborted_transaction_does_not_consume_a_number() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();

        let mut tx = store.begin(tenant).await.unwrap();
        next_number(&mut *tx, DocumentKind::HelpdeskTicket, 5).await.unwrap();
        tx.abort().await.unwrap();

        let mut tx = store.begin(tenant).await.unwrap();
        assert_eq!(
            next_number(&mut *tx, DocumentKind::HelpdeskTicket, 5).await.unwrap(),
            "TKT-00001"
        );
    }

    #[tokio::test]
    async fn racing_allocations_conflict_instead_of_duplicating() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut seed = store.begin(tenant).await.unwrap();
        next_number(&mut *seed, DocumentKind::PosSale, 5).await.unwrap();
        seed.commit().await.unwrap();

        let mut a = store.begin(tenant).await.unwrap();
        let mut b = store.begin(tenant).await.unwrap();
        assert_eq!(next_number(&mut *a, DocumentKind::PosSale, 5).await.unwrap(), "POS-00002");
        assert_eq!(next_number(&mut *b, DocumentKind::PosSale, 5).await.unwrap(), "POS-00002");
        a.commit().await.unwrap();
        assert!(matches!(b.commit().await, Err(StoreError::Conflict(_))));
    }
}
