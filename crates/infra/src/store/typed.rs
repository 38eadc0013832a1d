//! Typed access to documents through [`Entity`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use mercato_core::{Entity, ExpectedVersion};

use super::{Filter, StoreError, StoreTx, StoredDocument};

/// A decoded document together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

fn decode<T: DeserializeOwned>(collection: &str, doc: StoredDocument) -> Result<Versioned<T>, StoreError> {
    let value = serde_json::from_value(doc.body).map_err(|e| {
        StoreError::Serialization(format!("{collection}/{}: {e}", doc.id))
    })?;
    Ok(Versioned {
        version: doc.version,
        value,
    })
}

fn encode<T: Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub async fn load<T>(tx: &mut dyn StoreTx, key: &str) -> Result<Option<Versioned<T>>, StoreError>
where
    T: Entity + DeserializeOwned,
{
    match tx.get(T::COLLECTION, key).await? {
        Some(doc) => decode(T::COLLECTION, doc).map(Some),
        None => Ok(None),
    }
}

pub async fn find<T>(tx: &mut dyn StoreTx, filter: &Filter) -> Result<Vec<Versioned<T>>, StoreError>
where
    T: Entity + DeserializeOwned,
{
    tx.find(T::COLLECTION, filter)
        .await?
        .into_iter()
        .map(|doc| decode(T::COLLECTION, doc))
        .collect()
}

/// Stage a brand-new document; conflicts if the key is taken.
pub async fn insert<T>(tx: &mut dyn StoreTx, value: &T) -> Result<u64, StoreError>
where
    T: Entity + Serialize,
{
    let body = encode(value)?;
    tx.put(T::COLLECTION, &value.key(), body, ExpectedVersion::Absent)
        .await
}

/// Stage an update of a document previously read at `version`.
pub async fn save<T>(tx: &mut dyn StoreTx, value: &T, version: u64) -> Result<u64, StoreError>
where
    T: Entity + Serialize,
{
    let body = encode(value)?;
    tx.put(T::COLLECTION, &value.key(), body, ExpectedVersion::Exact(version))
        .await
}
