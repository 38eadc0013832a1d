//! Sales orders domain module.
//!
//! Business rules for sales orders and their deliveries, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage). Stock reservation
//! and issue happen in the infra workflows that drive these documents.

pub mod order;

pub use order::{
    Delivery, DeliveryLine, DeliveryRequest, NewSalesOrder, NewSalesOrderLine, OrderLineDraft,
    OutstandingLine, PlannedIssue, SalesOrder, SalesOrderId, SalesOrderLine, SalesOrderStatus,
};
