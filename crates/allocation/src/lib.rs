//! Allocation domain: order lines, stock batches and the `Product` aggregate.
//!
//! Pure, deterministic business rules (no IO, no storage, no dispatch). The
//! aggregate records domain events as it is mutated; draining them is the
//! caller's job.

pub mod batch;
pub mod commands;
pub mod error;
pub mod events;
pub mod product;

pub use batch::{Batch, OrderLine};
pub use commands::{Allocate, AllocationCommand, ChangeBatchQuantity, CreateBatch};
pub use error::AllocationError;
pub use events::{AllocationEvent, AllocationRequired, BatchCreated, OutOfStock};
pub use product::Product;
