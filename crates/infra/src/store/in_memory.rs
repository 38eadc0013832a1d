use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use mercato_core::{ExpectedVersion, TenantId};

use super::{DocumentStore, Filter, StoreError, StoreTx, StoredDocument};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct DocKey {
    tenant_id: TenantId,
    collection: String,
    id: String,
}

#[derive(Debug, Clone)]
struct Entry {
    version: u64,
    body: JsonValue,
}

type Documents = BTreeMap<DocKey, Entry>;

/// In-memory document store.
///
/// Intended for tests/dev. Reads see committed state plus the transaction's own
/// staged writes; commit re-validates every written key under the write lock.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDocumentStore {
    docs: Arc<RwLock<Documents>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(InMemoryTx {
            docs: Arc::clone(&self.docs),
            tenant_id,
            staged: HashMap::new(),
        }))
    }
}

#[derive(Debug)]
struct StagedWrite {
    /// Committed version this write was based on, checked again at commit.
    expected: ExpectedVersion,
    version: u64,
    body: JsonValue,
}

struct InMemoryTx {
    docs: Arc<RwLock<Documents>>,
    tenant_id: TenantId,
    staged: HashMap<DocKey, StagedWrite>,
}

impl InMemoryTx {
    fn key(&self, collection: &str, id: &str) -> DocKey {
        DocKey {
            tenant_id: self.tenant_id,
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    fn committed_version(&self, key: &DocKey) -> Result<Option<u64>, StoreError> {
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.get(key).map(|e| e.version))
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let key = self.key(collection, id);
        if let Some(w) = self.staged.get(&key) {
            return Ok(Some(StoredDocument {
                id: id.to_string(),
                version: w.version,
                body: w.body.clone(),
            }));
        }
        let docs = self.docs.read().map_err(|_| poisoned())?;
        Ok(docs.get(&key).map(|e| StoredDocument {
            id: id.to_string(),
            version: e.version,
            body: e.body.clone(),
        }))
    }

    async fn find(&mut self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let mut found: BTreeMap<String, StoredDocument> = BTreeMap::new();
        {
            let docs = self.docs.read().map_err(|_| poisoned())?;
            for (k, e) in docs.iter() {
                if k.tenant_id == self.tenant_id && k.collection == collection {
                    found.insert(
                        k.id.clone(),
                        StoredDocument {
                            id: k.id.clone(),
                            version: e.version,
                            body: e.body.clone(),
                        },
                    );
                }
            }
        }
        for (k, w) in &self.staged {
            if k.collection == collection {
                found.insert(
                    k.id.clone(),
                    StoredDocument {
                        id: k.id.clone(),
                        version: w.version,
                        body: w.body.clone(),
                    },
                );
            }
        }
        Ok(found
            .into_values()
            .filter(|d| filter.matches(&d.body))
            .collect())
    }

    async fn put(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let key = self.key(collection, id);

        if let Some(w) = self.staged.get_mut(&key) {
            if !expected.matches(Some(w.version)) {
                return Err(StoreError::Conflict(format!(
                    "{collection}/{id}: expected {expected:?}, found {}",
                    w.version
                )));
            }
            w.version += 1;
            w.body = body;
            return Ok(w.version);
        }

        let current = self.committed_version(&key)?;
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "{collection}/{id}: expected {expected:?}, found {current:?}"
            )));
        }
        let version = current.unwrap_or(0) + 1;
        self.staged.insert(
            key,
            StagedWrite {
                expected: match expected {
                    ExpectedVersion::Any => ExpectedVersion::Any,
                    _ => ExpectedVersion::from_read(current),
                },
                version,
                body,
            },
        );
        Ok(version)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut docs = this.docs.write().map_err(|_| poisoned())?;

        for (key, w) in &this.staged {
            let current = docs.get(key).map(|e| e.version);
            if !w.expected.matches(current) {
                return Err(StoreError::Conflict(format!(
                    "{}/{} changed concurrently (expected {:?}, found {current:?})",
                    key.collection, key.id, w.expected
                )));
            }
        }

        for (key, w) in this.staged {
            let version = match w.expected {
                // Blind writes land on top of whatever is committed.
                ExpectedVersion::Any => docs.get(&key).map(|e| e.version).unwrap_or(0) + 1,
                _ => w.version,
            };
            docs.insert(
                key,
                Entry {
                    version,
                    body: w.body,
                },
            );
        }
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();

        let mut tx = store.begin(tenant).await.unwrap();
        tx.put("things", "a", json!({ "n": 1 }), ExpectedVersion::Absent)
            .await
            .unwrap();
        assert!(tx.get("things", "a").await.unwrap().is_some());

        let mut other = store.begin(tenant).await.unwrap();
        assert!(other.get("things", "a").await.unwrap().is_none());

        tx.commit().await.unwrap();
        let doc = other.get("things", "a").await.unwrap().unwrap();
        assert_eq!(doc.version, 1);
    }

    #[tokio::test]
    async fn aborted_transaction_leaves_no_trace() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin(tenant).await.unwrap();
        tx.put("things", "a", json!({}), ExpectedVersion::Absent).await.unwrap();
        tx.abort().await.unwrap();

        let mut tx = store.begin(tenant).await.unwrap();
        assert!(tx.get("things", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn concurrent_writers_of_same_version_conflict_at_commit() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut seed = store.begin(tenant).await.unwrap();
        seed.put("rows", "r", json!({ "q": 0 }), ExpectedVersion::Absent).await.unwrap();
        seed.commit().await.unwrap();

        let mut a = store.begin(tenant).await.unwrap();
        let mut b = store.begin(tenant).await.unwrap();
        let va = a.get("rows", "r").await.unwrap().unwrap().version;
        let vb = b.get("rows", "r").await.unwrap().unwrap().version;
        a.put("rows", "r", json!({ "q": 1 }), ExpectedVersion::Exact(va)).await.unwrap();
        b.put("rows", "r", json!({ "q": 2 }), ExpectedVersion::Exact(vb)).await.unwrap();

        a.commit().await.unwrap();
        assert!(matches!(b.commit().await, Err(StoreError::Conflict(_))));

        let mut check = store.begin(tenant).await.unwrap();
        let doc = check.get("rows", "r").await.unwrap().unwrap();
        assert_eq!(doc.body, json!({ "q": 1 }));
        assert_eq!(doc.version, 2);
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryDocumentStore::new();
        let (t1, t2) = (TenantId::new(), TenantId::new());
        let mut tx = store.begin(t1).await.unwrap();
        tx.put("things", "a", json!({ "x": 1 }), ExpectedVersion::Absent).await.unwrap();
        tx.commit().await.unwrap();

        let mut other = store.begin(t2).await.unwrap();
        assert!(other.get("things", "a").await.unwrap().is_none());
        assert!(other.find("things", &Filter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_merges_staged_and_committed() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin(tenant).await.unwrap();
        tx.put("p", "1", json!({ "kind": "a" }), ExpectedVersion::Absent).await.unwrap();
        tx.put("p", "2", json!({ "kind": "b" }), ExpectedVersion::Absent).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin(tenant).await.unwrap();
        tx.put("p", "2", json!({ "kind": "a" }), ExpectedVersion::Exact(1)).await.unwrap();
        let found = tx.find("p", &Filter::all().eq("kind", "a")).await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].version, 2);
    }

    #[tokio::test]
    async fn absent_rejects_existing_document() {
        let store = InMemoryDocumentStore::new();
        let tenant = TenantId::new();
        let mut tx = store.begin(tenant).await.unwrap();
        tx.put("p", "1", json!({}), ExpectedVersion::Absent).await.unwrap();
        assert!(matches!(
            tx.put("p", "1", json!({}), ExpectedVersion::Absent).await,
            Err(StoreError::Conflict(_))
        ));
    }
}
