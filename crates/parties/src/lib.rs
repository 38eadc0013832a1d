//! Parties domain module (customers and suppliers).
//!
//! Pure domain logic (no IO, no HTTP, no storage).

pub mod party;

pub use party::{ContactInfo, NewParty, Party, PartyId, PartyKind, PartyStatus, PartyUpdate};
