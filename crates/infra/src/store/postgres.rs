//! Postgres-backed document store.
//!
//! All documents live in one table keyed by `(tenant_id, collection, id)` with
//! a JSONB body. Each [`StoreTx`] wraps an sqlx transaction; rows are locked
//! with `SELECT ... FOR UPDATE` when read so concurrent writers serialize on
//! them, and inserts of an existing key surface as `Conflict`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (serialization failure / deadlock) | `40001` / `40P01` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | Other | N/A | `Backend` |

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use mercato_core::{ExpectedVersion, TenantId};

use super::{DocumentStore, Filter, StoreError, StoreTx, StoredDocument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    tenant_id   UUID        NOT NULL,
    collection  TEXT        NOT NULL,
    id          TEXT        NOT NULL,
    version     BIGINT      NOT NULL CHECK (version > 0),
    body        JSONB       NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
    PRIMARY KEY (tenant_id, collection, id)
);
CREATE INDEX IF NOT EXISTS documents_body_gin ON documents USING GIN (body jsonb_path_ops);
"#;

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the documents table if it does not exist.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn begin(&self, tenant_id: TenantId) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PostgresTx { tx, tenant_id }))
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
    tenant_id: TenantId,
}

impl PostgresTx {
    async fn locked_version(&mut self, collection: &str, id: &str) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query(
            "SELECT version FROM documents WHERE tenant_id = $1 AND collection = $2 AND id = $3 FOR UPDATE",
        )
        .bind(self.tenant_id.as_uuid())
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_document", e))?;

        row.map(|r| r.try_get::<i64, _>("version").map(|v| v as u64))
            .transpose()
            .map_err(|e| map_sqlx_error("lock_document", e))
    }
}

fn to_document(row: &sqlx::postgres::PgRow) -> Result<StoredDocument, sqlx::Error> {
    Ok(StoredDocument {
        id: row.try_get("id")?,
        version: row.try_get::<i64, _>("version")? as u64,
        body: row.try_get::<JsonValue, _>("body")?,
    })
}

#[async_trait]
impl StoreTx for PostgresTx {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    #[instrument(skip(self), fields(tenant_id = %self.tenant_id), err)]
    async fn get(&mut self, collection: &str, id: &str) -> Result<Option<StoredDocument>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE tenant_id = $1 AND collection = $2 AND id = $3
            FOR UPDATE
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("get_document", e))?;

        row.as_ref()
            .map(to_document)
            .transpose()
            .map_err(|e| map_sqlx_error("get_document", e))
    }

    #[instrument(skip(self, filter), fields(tenant_id = %self.tenant_id), err)]
    async fn find(&mut self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, version, body
            FROM documents
            WHERE tenant_id = $1 AND collection = $2 AND body @> $3
            ORDER BY id ASC
            "#,
        )
        .bind(self.tenant_id.as_uuid())
        .bind(collection)
        .bind(filter.to_object())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("find_documents", e))?;

        rows.iter()
            .map(to_document)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| map_sqlx_error("find_documents", e))
    }

    #[instrument(skip(self, body), fields(tenant_id = %self.tenant_id), err)]
    async fn put(
        &mut self,
        collection: &str,
        id: &str,
        body: JsonValue,
        expected: ExpectedVersion,
    ) -> Result<u64, StoreError> {
        let current = self.locked_version(collection, id).await?;
        if !expected.matches(current) {
            return Err(StoreError::Conflict(format!(
                "{collection}/{id}: expected {expected:?}, found {current:?}"
            )));
        }

        let version = current.unwrap_or(0) + 1;
        let query = if current.is_some() {
            r#"
            UPDATE documents SET version = $4, body = $5, updated_at = now()
            WHERE tenant_id = $1 AND collection = $2 AND id = $3
            "#
        } else {
            r#"
            INSERT INTO documents (tenant_id, collection, id, version, body)
            VALUES ($1, $2, $3, $4, $5)
            "#
        };

        sqlx::query(query)
            .bind(self.tenant_id.as_uuid())
            .bind(collection)
            .bind(id)
            .bind(version as i64)
            .bind(&body)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("put_document", e))?;

        Ok(version)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }

    async fn abort(self: Box<Self>) -> Result<(), StoreError> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx_error("rollback", e))
    }
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("40001") | Some("40P01") => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        other => StoreError::Backend(format!("{} failed: {}", operation, other)),
    }
}
