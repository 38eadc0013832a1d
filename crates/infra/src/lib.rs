//! Infrastructure layer: document store backends, document numbering and the
//! transactional workflows that drive the domain crates.

pub mod numbering;
pub mod store;
pub mod workflows;

pub use store::{DocumentStore, InMemoryDocumentStore, StoreError, StoreTx};
#[cfg(feature = "postgres")]
pub use store::PostgresDocumentStore;
pub use workflows::{Actor, WorkflowConfig, WorkflowError, WorkflowResult, Workflows};
