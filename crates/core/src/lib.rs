//! `mercato-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod amount;
pub mod entity;
pub mod error;
pub mod id;
pub mod numbering;
pub mod version;

pub use amount::{DocumentTotals, LineAmounts};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{DocumentId, TenantId, UserId};
pub use numbering::DocumentKind;
pub use version::ExpectedVersion;
