//! Repository over `Product` aggregates.
//!
//! The repository is the session-scoped identity map: every product it hands
//! out (via `get`, `get_by_batchref` or `add`) is tracked in its seen set
//! until the owning unit of work goes away. Asking for the same SKU twice
//! returns the same instance, and the seen set is what the message bus
//! harvests domain events from.

use serde_json::Value as JsonValue;

use stockline_allocation::Product;
use stockline_core::{BatchRef, ExpectedVersion, Sku};

use crate::store::{ProductStore, ProductWrite, StoreError};

/// Persistence abstraction over products, keyed by SKU.
pub trait ProductRepository {
    /// Track a new product. Fails if the SKU is already tracked.
    fn add(&mut self, product: Product) -> Result<&mut Product, StoreError>;

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StoreError>;

    /// Fetch the product for `sku`, creating (and tracking) an empty one if
    /// storage has none.
    fn get_or_create(&mut self, sku: &Sku) -> Result<&mut Product, StoreError>;

    /// Secondary lookup by batch reference.
    fn get_by_batchref(&mut self, reference: &BatchRef) -> Result<Option<&mut Product>, StoreError>;

    /// Every product returned or added so far, in the order first seen.
    fn seen(&mut self) -> impl Iterator<Item = &mut Product>;
}

#[derive(Debug)]
struct Tracked {
    product: Product,
    /// Store revision the product was read at (`Exact(0)` when new).
    expected: ExpectedVersion,
    /// Snapshot as loaded; unchanged products are not written back.
    loaded: Option<JsonValue>,
}

/// Repository bound to one session over a `ProductStore`.
#[derive(Debug)]
pub struct StoreRepository<S> {
    store: S,
    seen: Vec<Tracked>,
}

impl<S> StoreRepository<S>
where
    S: ProductStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            seen: Vec::new(),
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Write every changed product back to the store in one atomic commit.
    pub fn flush(&mut self) -> Result<usize, StoreError> {
        let mut writes = Vec::new();
        let mut positions = Vec::new();
        for (idx, tracked) in self.seen.iter().enumerate() {
            let write = ProductWrite::from_product(&tracked.product, tracked.expected)?;
            if tracked.loaded.as_ref() == Some(&write.payload) {
                continue;
            }
            writes.push(write);
            positions.push(idx);
        }

        let rows = self.store.commit(writes)?;
        for (idx, row) in positions.into_iter().zip(&rows) {
            let tracked = &mut self.seen[idx];
            tracked.expected = ExpectedVersion::Exact(row.revision);
            tracked.loaded = Some(row.payload.clone());
        }
        Ok(rows.len())
    }

    /// Forget everything tracked (uncommitted changes are lost).
    pub fn discard(&mut self) {
        self.seen.clear();
    }

    fn position(&self, sku: &Sku) -> Option<usize> {
        self.seen.iter().position(|t| t.product.sku() == sku)
    }

    fn track_loaded(&mut self, row: crate::store::StoredProduct) -> Result<usize, StoreError> {
        let product = row.to_product()?;
        self.seen.push(Tracked {
            product,
            expected: ExpectedVersion::Exact(row.revision),
            loaded: Some(row.payload),
        });
        Ok(self.seen.len() - 1)
    }

    fn index_for(&mut self, sku: &Sku) -> Result<Option<usize>, StoreError> {
        if let Some(idx) = self.position(sku) {
            return Ok(Some(idx));
        }
        match self.store.load(sku)? {
            Some(row) => self.track_loaded(row).map(Some),
            None => Ok(None),
        }
    }
}

impl<S> ProductRepository for StoreRepository<S>
where
    S: ProductStore,
{
    fn add(&mut self, product: Product) -> Result<&mut Product, StoreError> {
        if self.position(product.sku()).is_some() {
            return Err(StoreError::Conflict(format!(
                "product {} is already tracked",
                product.sku()
            )));
        }
        self.seen.push(Tracked {
            product,
            expected: ExpectedVersion::Exact(0),
            loaded: None,
        });
        let idx = self.seen.len() - 1;
        Ok(&mut self.seen[idx].product)
    }

    fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>, StoreError> {
        Ok(self.index_for(sku)?.map(|idx| &mut self.seen[idx].product))
    }

    fn get_or_create(&mut self, sku: &Sku) -> Result<&mut Product, StoreError> {
        match self.index_for(sku)? {
            Some(idx) => Ok(&mut self.seen[idx].product),
            None => self.add(Product::new(sku.clone())),
        }
    }

    fn get_by_batchref(&mut self, reference: &BatchRef) -> Result<Option<&mut Product>, StoreError> {
        let idx = match self.seen.iter().position(|t| t.product.batch(reference).is_some()) {
            Some(idx) => Some(idx),
            None => match self.store.find_by_batchref(reference)? {
                Some(row) => match self.position(&row.sku) {
                    Some(idx) => Some(idx),
                    None => Some(self.track_loaded(row)?),
                },
                None => None,
            },
        };
        Ok(idx.map(|idx| &mut self.seen[idx].product))
    }

    fn seen(&mut self) -> impl Iterator<Item = &mut Product> {
        self.seen.iter_mut().map(|t| &mut t.product)
    }
}
