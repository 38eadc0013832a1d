//! Infrastructure wiring: picks the document store and builds the workflows.

use std::sync::Arc;

use mercato_infra::store::DocumentStore;
use mercato_infra::{InMemoryDocumentStore, StoreError, WorkflowConfig, Workflows};

use crate::config::{ApiConfig, StoreBackend};

/// Shared state behind every handler.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub workflows: Workflows,
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices, StoreError> {
    let store = open_store(config).await?;
    let workflows = Workflows::new(
        store,
        WorkflowConfig {
            number_width: config.number_width,
        },
    );
    Ok(AppServices { workflows })
}

async fn open_store(config: &ApiConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.store_backend {
        StoreBackend::Memory => {
            tracing::info!("using in-memory document store");
            Ok(Arc::new(InMemoryDocumentStore::new()))
        }
        StoreBackend::Postgres => open_postgres(config).await,
    }
}

#[cfg(feature = "postgres")]
async fn open_postgres(config: &ApiConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;
    let store = mercato_infra::PostgresDocumentStore::connect(url).await?;
    store.migrate().await?;
    tracing::info!("using postgres document store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "postgres"))]
async fn open_postgres(_config: &ApiConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    tracing::warn!("postgres backend requested but not compiled in; falling back to in-memory store");
    Ok(Arc::new(InMemoryDocumentStore::new()))
}
