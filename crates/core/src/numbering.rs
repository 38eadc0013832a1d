//! Human-facing document numbers (`SO-00042`).
//!
//! Sequence allocation lives in the store layer (a per-tenant counter document
//! incremented inside the same transaction that writes the document). This
//! module only knows prefixes and formatting.

use serde::{Deserialize, Serialize};

/// Kinds of numbered documents.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SalesOrder,
    PurchaseOrder,
    PurchaseInvoice,
    ProductionOrder,
    PosSale,
    HelpdeskTicket,
}

impl DocumentKind {
    pub fn prefix(self) -> &'static str {
        match self {
            DocumentKind::SalesOrder => "SO",
            DocumentKind::PurchaseOrder => "PO",
            DocumentKind::PurchaseInvoice => "PI",
            DocumentKind::ProductionOrder => "MO",
            DocumentKind::PosSale => "POS",
            DocumentKind::HelpdeskTicket => "TKT",
        }
    }

    /// Key of the counter document backing this kind.
    pub fn counter_key(self) -> &'static str {
        match self {
            DocumentKind::SalesOrder => "sales_order",
            DocumentKind::PurchaseOrder => "purchase_order",
            DocumentKind::PurchaseInvoice => "purchase_invoice",
            DocumentKind::ProductionOrder => "production_order",
            DocumentKind::PosSale => "pos_sale",
            DocumentKind::HelpdeskTicket => "helpdesk_ticket",
        }
    }
}

/// Default zero-padding width of the numeric part.
pub const DEFAULT_NUMBER_WIDTH: usize = 5;

pub fn format_document_number(kind: DocumentKind, seq: u64, width: usize) -> String {
    format!("{}-{:0width$}", kind.prefix(), seq, width = width)
}

/// Numeric part of a formatted document number (`"SO-00042"` → `42`).
pub fn document_sequence(number: &str) -> Option<u64> {
    number.rsplit_once('-')?.1.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_survives_width_overflow() {
        assert_eq!(document_sequence("SO-00042"), Some(42));
        assert_eq!(document_sequence("SO-100000"), Some(100_000));
        assert_eq!(document_sequence("garbage"), None);
    }

    #[test]
    fn pads_to_width() {
        assert_eq!(
            format_document_number(DocumentKind::SalesOrder, 42, DEFAULT_NUMBER_WIDTH),
            "SO-00042"
        );
        assert_eq!(format_document_number(DocumentKind::PosSale, 7, 3), "POS-007");
    }

    #[test]
    fn overflowing_width_keeps_all_digits() {
        assert_eq!(
            format_document_number(DocumentKind::HelpdeskTicket, 123_456, 4),
            "TKT-123456"
        );
    }
}
