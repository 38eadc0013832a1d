//! Inventory domain module.
//!
//! Stock bookkeeping per (product, warehouse): on-hand, committed and on-order
//! quantities, batch/lot tracking and the stock-movement audit trail. Pure
//! domain logic (no IO, no HTTP, no storage); the infra layer applies these
//! operations inside store transactions.

pub mod allocation;
pub mod movement;
pub mod record;
pub mod warehouse;

pub use allocation::{BatchAllocation, BatchRequest};
pub use movement::{MovementKind, MovementReference, StockMovement, StockMovementId};
pub use record::{Batch, BatchReceipt, InventoryKey, InventoryRecord, IssueMode, StockChange};
pub use warehouse::{NewWarehouse, Warehouse, WarehouseId};
