//! Price lists and line price resolution.

pub mod price_list;

pub use price_list::{
    NewPriceList, PriceList, PriceListEntry, PriceListId, PriceSource, ResolvedPrice,
    resolve_line_price,
};
