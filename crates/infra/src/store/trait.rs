use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use stockline_allocation::Product;
use stockline_core::{BatchRef, DomainError, ExpectedVersion, Sku};

/// A product snapshot as it sits in durable storage.
///
/// `revision` belongs to the store (it counts committed writes of the row)
/// and is independent of the aggregate's own `version_number`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredProduct {
    pub sku: Sku,
    pub revision: u64,
    pub batch_refs: Vec<BatchRef>,
    pub payload: JsonValue,
}

impl StoredProduct {
    /// Rebuild the aggregate from its snapshot (with no pending events).
    pub fn to_product(&self) -> Result<Product, StoreError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| StoreError::Serialization(format!("product {}: {e}", self.sku)))
    }
}

/// One row to write during a commit, with the revision it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductWrite {
    pub sku: Sku,
    pub expected: ExpectedVersion,
    pub batch_refs: Vec<BatchRef>,
    pub payload: JsonValue,
}

impl ProductWrite {
    pub fn from_product(product: &Product, expected: ExpectedVersion) -> Result<Self, StoreError> {
        let payload = serde_json::to_value(product)
            .map_err(|e| StoreError::Serialization(format!("product {}: {e}", product.sku())))?;
        Ok(Self {
            sku: product.sku().clone(),
            expected,
            batch_refs: product.batches().iter().map(|b| b.reference().clone()).collect(),
            payload,
        })
    }
}

/// Persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Stale write or identity clash (optimistic concurrency).
    #[error("storage conflict: {0}")]
    Conflict(String),

    #[error("product (de)serialization failed: {0}")]
    Serialization(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
            other => StoreError::Conflict(other.to_string()),
        }
    }
}

/// Durable key-value storage of `Product` snapshots (persistence collaborator).
///
/// Implementations must:
/// - return independent copies, so uncommitted changes in one session are
///   invisible to every other session
/// - apply a `commit` batch atomically: every write lands or none does
/// - reject writes whose `expected` revision no longer matches
/// - keep batch references unique across products
pub trait ProductStore: Send + Sync {
    fn load(&self, sku: &Sku) -> Result<Option<StoredProduct>, StoreError>;

    /// Secondary lookup: the product owning the batch `reference`.
    fn find_by_batchref(&self, reference: &BatchRef) -> Result<Option<StoredProduct>, StoreError>;

    /// Persist a batch of writes; returns the stored rows with new revisions.
    fn commit(&self, writes: Vec<ProductWrite>) -> Result<Vec<StoredProduct>, StoreError>;
}

impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    fn load(&self, sku: &Sku) -> Result<Option<StoredProduct>, StoreError> {
        (**self).load(sku)
    }

    fn find_by_batchref(&self, reference: &BatchRef) -> Result<Option<StoredProduct>, StoreError> {
        (**self).find_by_batchref(reference)
    }

    fn commit(&self, writes: Vec<ProductWrite>) -> Result<Vec<StoredProduct>, StoreError> {
        (**self).commit(writes)
    }
}
