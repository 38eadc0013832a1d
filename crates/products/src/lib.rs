//! Products domain module (item master).
//!
//! Pure domain logic for products (no IO, no HTTP, no storage).

pub mod product;

pub use product::{NewProduct, Product, ProductId, ProductStatus, ProductUpdate, normalize_sku};
