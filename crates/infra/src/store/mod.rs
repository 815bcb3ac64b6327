//! Product storage boundary.
//!
//! Defines what the core needs from persistence (load by SKU, load by batch
//! reference, atomic commit) without assuming any storage engine.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryProductStore;
pub use r#trait::{ProductStore, ProductWrite, StoreError, StoredProduct};
