//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Every persisted document is an entity: it lives in a named collection and
/// is addressed there by its string key.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Collection the entity is stored in.
    const COLLECTION: &'static str;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Key of the entity within its collection.
    fn key(&self) -> String;
}
