//! Production (manufacturing) orders.
//!
//! A production order turns components into a finished product. Pure domain
//! logic; the infra workflow reserves, consumes and receives the stock.

pub mod order;

pub use order::{
    Component, NewComponent, NewProductionOrder, ProductionOrder, ProductionOrderId,
    ProductionStatus,
};
