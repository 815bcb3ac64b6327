//! Entity trait: identity that survives state changes.

/// An object defined by its identifier rather than its attributes.
///
/// Two entities with the same id are the same entity even when the rest of
/// their state differs.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
