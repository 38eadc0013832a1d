//! Purchasing domain module (purchase orders and supplier invoices).
//!
//! This crate contains business rules for purchasing documents, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod invoice;
pub mod order;

pub use invoice::{
    NewPurchaseInvoice, NewPurchaseInvoiceLine, PurchaseInvoice, PurchaseInvoiceId,
    PurchaseInvoiceLine, normalize_reference,
};
pub use order::{
    NewPurchaseOrder, NewPurchaseOrderLine, PurchaseOrder, PurchaseOrderId, PurchaseOrderLine,
    PurchaseOrderStatus, UnreceivedLine,
};
