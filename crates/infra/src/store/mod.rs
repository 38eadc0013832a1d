//! Tenant-scoped transactional document store.
//!
//! Documents are JSON bodies addressed by `(tenant, collection, id)` and carry a
//! monotonically increasing `version` used for optimistic concurrency. Every
//! multi-document business operation runs inside one [`StoreTx`]: reads, staged
//! writes, then `commit` (all writes become visible) or `abort` (none do).

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod typed;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use mercato_core::{ExpectedVersion, TenantId};

pub use in_memory::InMemoryDocumentStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresDocumentStore;
pub use typed::Versioned;

/// A stored document as read back from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub version: u64,
    pub body: JsonValue,
}

/// Store operation error.
///
/// These are **infrastructure errors** (storage, concurrency, isolation) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Optimistic concurrency check failed (stale version or duplicate key).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("tenant isolation violation: {0}")]
    TenantIsolation(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Equality filter on top-level body fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    fields: Vec<(String, JsonValue)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    /// Require `field == value`. Values that fail to serialize match nothing.
    pub fn eq(mut self, field: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(JsonValue::Null);
        self.fields.push((field.into(), value));
        self
    }

    pub fn fields(&self) -> &[(String, JsonValue)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn matches(&self, body: &JsonValue) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| body.get(field) == Some(value))
    }

    /// JSON object form, for containment queries (`body @> filter`).
    pub fn to_object(&self) -> JsonValue {
        JsonValue::Object(self.fields.iter().cloned().collect())
    }
}

/// One open transaction, bound to a single tenant.
///
/// Implementations must:
/// - scope every read and write to [`StoreTx::tenant_id`]
/// - make staged writes visible to later reads in the same transaction
/// - on `commit`, apply all writes atomically or fail with `Conflict`
#[async_trait]
pub trait StoreTx: Send {
    fn tenant_id(&self) -> TenantId;

    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError>;

    /// Documents of `collection` matching `filter`, ordered by id.
    async fn find(&mut self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError>;

    /// Stage a write; returns the version the document will have once committed.
    async fn put(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn abort(self: Box<Self>) -> Result<(), StoreError>;
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn StoreTx>, StoreError>;
}

#[async_trait]
impl<S> DocumentStore for Arc<S>
where
    S: DocumentStore + ?Sized,
{
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn StoreTx>, StoreError> {
        (**self).begin(tenant_id).await
    }
}
