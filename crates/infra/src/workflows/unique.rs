//! Per-tenant uniqueness claims (SKU, warehouse code, supplier reference).
//!
//! A claim is a tiny document whose key is the unique value. Two transactions
//! claiming the same value both stage an `Absent` write, so the second commit
//! fails with a conflict even when neither saw the other's document.

use serde_json::json;

use mercato_core::{DomainError, ExpectedVersion};

use crate::store::StoreTx;

use super::WorkflowResult;

const UNIQUE_KEYS: &str = "unique_keys";

pub(crate) async fn claim(
    tx: &mut dyn StoreTx,
    scope: &str,
    value: &str,
    owner: &str,
    label: &str,
) -> WorkflowResult<()> {
    let key = format!("{scope}:{value}");
    if tx.get(UNIQUE_KEYS, &key).await?.is_some() {
        return Err(DomainError::conflict(format!("{label} '{value}' already exists")).into());
    }
    tx.put(
        UNIQUE_KEYS,
        &key,
        json!({ "scope": scope, "value": value, "owner": owner }),
        ExpectedVersion::Absent,
    )
    .await?;
    Ok(())
}
