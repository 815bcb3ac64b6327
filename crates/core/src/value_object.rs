//! Value object trait: equality by value, not identity.

/// Marker for immutable values compared attribute by attribute.
///
/// An order line is a value object: two lines for the same order, SKU and
/// quantity are interchangeable. A batch is not (see [`crate::Entity`]).
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
