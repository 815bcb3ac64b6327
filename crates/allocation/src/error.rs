use thiserror::Error;

use stockline_core::{BatchRef, DomainError, Sku};

/// Failures raised by the `Product` aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AllocationError {
    /// No batch of the product can take the requested line.
    #[error("Out of stock for sku {0}")]
    OutOfStock(Sku),

    #[error("unknown batch {0}")]
    UnknownBatch(BatchRef),

    #[error("batch {0} already exists")]
    DuplicateBatch(BatchRef),

    #[error(transparent)]
    Domain(#[from] DomainError),
}
