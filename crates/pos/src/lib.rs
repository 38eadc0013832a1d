//! Point-of-sale (counter) sales.

pub mod sale;

pub use sale::{
    NewPosLine, NewPosSale, Payment, PaymentMethod, PosLine, PosLineDraft, PosSale, PosSaleId,
};
