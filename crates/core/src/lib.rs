//! `stockline-core`: domain building blocks shared by the allocation crates.
//!
//! Pure domain primitives only: no storage, no dispatch, no IO.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BatchRef, OrderId, Sku};
pub use value_object::ValueObject;
