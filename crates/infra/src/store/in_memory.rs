use std::collections::HashMap;
use std::sync::RwLock;

use stockline_allocation::Product;
use stockline_core::{BatchRef, Sku};

use super::r#trait::{ProductStore, ProductWrite, StoreError, StoredProduct};

#[derive(Debug, Default)]
struct State {
    rows: HashMap<Sku, StoredProduct>,
    /// Secondary index: batch reference -> owning SKU.
    batch_index: HashMap<BatchRef, Sku>,
}

/// In-memory product store.
///
/// Intended for tests/dev. Snapshots are kept as JSON, so every load hands out
/// a fresh copy and sessions never share aggregate instances.
#[derive(Debug, Default)]
pub struct InMemoryProductStore {
    state: RwLock<State>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed state of a product, for inspection.
    pub fn snapshot(&self, sku: &Sku) -> Result<Option<Product>, StoreError> {
        self.load(sku)?.map(|row| row.to_product()).transpose()
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.rows.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn validate(state: &State, writes: &[ProductWrite]) -> Result<(), StoreError> {
        let mut claimed: HashMap<&BatchRef, &Sku> = HashMap::new();

        for (idx, w) in writes.iter().enumerate() {
            if writes[..idx].iter().any(|earlier| earlier.sku == w.sku) {
                return Err(StoreError::Conflict(format!(
                    "product {} written twice in one commit",
                    w.sku
                )));
            }

            let current = state.rows.get(&w.sku).map_or(0, |row| row.revision);
            w.expected
                .check(current)
                .map_err(|e| StoreError::Conflict(format!("product {}: {e}", w.sku)))?;

            for reference in &w.batch_refs {
                let owner = claimed
                    .get(reference)
                    .copied()
                    .or_else(|| state.batch_index.get(reference));
                if let Some(owner) = owner {
                    if owner != &w.sku {
                        return Err(StoreError::Conflict(format!(
                            "batch {reference} already belongs to product {owner}"
                        )));
                    }
                }
                claimed.insert(reference, &w.sku);
            }
        }
        Ok(())
    }
}

impl ProductStore for InMemoryProductStore {
    fn load(&self, sku: &Sku) -> Result<Option<StoredProduct>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state.rows.get(sku).cloned())
    }

    fn find_by_batchref(&self, reference: &BatchRef) -> Result<Option<StoredProduct>, StoreError> {
        let state = self.state.read().map_err(|_| StoreError::Poisoned)?;
        Ok(state
            .batch_index
            .get(reference)
            .and_then(|sku| state.rows.get(sku))
            .cloned())
    }

    fn commit(&self, writes: Vec<ProductWrite>) -> Result<Vec<StoredProduct>, StoreError> {
        if writes.is_empty() {
            return Ok(vec![]);
        }

        let mut state = self.state.write().map_err(|_| StoreError::Poisoned)?;

        // Validate everything before touching anything (all or nothing).
        Self::validate(&state, &writes)?;

        let mut committed = Vec::with_capacity(writes.len());
        for w in writes {
            let revision = state.rows.get(&w.sku).map_or(0, |row| row.revision) + 1;
            for reference in &w.batch_refs {
                state.batch_index.insert(reference.clone(), w.sku.clone());
            }
            let row = StoredProduct {
                sku: w.sku.clone(),
                revision,
                batch_refs: w.batch_refs,
                payload: w.payload,
            };
            state.rows.insert(w.sku, row.clone());
            committed.push(row);
        }

        Ok(committed)
    }
}
