//! Unit of work: the transactional boundary of one handler invocation.
//!
//! A unit of work opens a session over the store and wraps it in a
//! repository. Nothing is written unless `commit` is called; a unit of work
//! that goes out of scope uncommitted is rolled back. The bus builds a new one
//! for every handler it runs, so each step of a cascade commits on its own.

use stockline_allocation::AllocationEvent;
use stockline_core::Aggregate;
use stockline_events::EventSource;

use crate::repository::{ProductRepository, StoreRepository};
use crate::store::{ProductStore, StoreError};

pub trait UnitOfWork: EventSource<AllocationEvent> {
    type Products: ProductRepository;

    fn products(&mut self) -> &mut Self::Products;

    /// Make every change to tracked products durable, atomically.
    fn commit(&mut self) -> Result<(), StoreError>;

    /// Drop uncommitted changes. Harvest events first: they go with them.
    fn rollback(&mut self);
}

/// Unit of work over any `ProductStore`.
#[derive(Debug)]
pub struct StoreUnitOfWork<S>
where
    S: ProductStore,
{
    products: StoreRepository<S>,
    committed: bool,
}

impl<S> StoreUnitOfWork<S>
where
    S: ProductStore,
{
    pub fn begin(store: S) -> Self {
        Self {
            products: StoreRepository::new(store),
            committed: false,
        }
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl<S> UnitOfWork for StoreUnitOfWork<S>
where
    S: ProductStore,
{
    type Products = StoreRepository<S>;

    fn products(&mut self) -> &mut Self::Products {
        &mut self.products
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        let written = self.products.flush()?;
        self.committed = true;
        tracing::debug!(written, "unit of work committed");
        Ok(())
    }

    fn rollback(&mut self) {
        self.products.discard();
    }
}

impl<S> EventSource<AllocationEvent> for StoreUnitOfWork<S>
where
    S: ProductStore,
{
    fn collect_new_events(&mut self) -> Vec<AllocationEvent> {
        self.products
            .seen()
            .flat_map(|product| product.take_events())
            .collect()
    }
}

impl<S> Drop for StoreUnitOfWork<S>
where
    S: ProductStore,
{
    fn drop(&mut self) {
        if !self.committed && self.products.seen_count() > 0 {
            tracing::debug!(
                tracked = self.products.seen_count(),
                "unit of work closed without commit; rolling back"
            );
        }
        self.rollback();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use stockline_allocation::{Batch, OrderLine, OutOfStock};
    use stockline_core::Sku;

    use super::*;
    use crate::store::InMemoryProductStore;

    fn store_with_batch(sku: &str, qty: u32) -> Arc<InMemoryProductStore> {
        let store = Arc::new(InMemoryProductStore::new());
        let mut uow = StoreUnitOfWork::begin(store.clone());
        uow.products()
            .get_or_create(&Sku::new(sku))
            .unwrap()
            .add_batch(Batch::new("b1", sku, qty, None))
            .unwrap();
        uow.commit().unwrap();
        store
    }

    #[test]
    fn commit_makes_changes_visible_to_new_sessions() {
        let store = store_with_batch("OMINOUS-MIRROR", 100);

        let mut uow = StoreUnitOfWork::begin(store.clone());
        let line = OrderLine::new("o1", "OMINOUS-MIRROR", 10).unwrap();
        uow.products()
            .get(&Sku::new("OMINOUS-MIRROR"))
            .unwrap()
            .unwrap()
            .allocate(line)
            .unwrap();
        uow.commit().unwrap();
        assert!(uow.is_committed());

        let product = store.snapshot(&Sku::new("OMINOUS-MIRROR")).unwrap().unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 90);
    }

    #[test]
    fn dropping_without_commit_rolls_back() {
        let store = store_with_batch("OMINOUS-MIRROR", 100);

        {
            let mut uow = StoreUnitOfWork::begin(store.clone());
            let line = OrderLine::new("o1", "OMINOUS-MIRROR", 10).unwrap();
            uow.products()
                .get(&Sku::new("OMINOUS-MIRROR"))
                .unwrap()
                .unwrap()
                .allocate(line)
                .unwrap();
        }

        let product = store.snapshot(&Sku::new("OMINOUS-MIRROR")).unwrap().unwrap();
        assert_eq!(product.batches()[0].available_quantity(), 100);
        assert_eq!(product.version_number(), 0);
    }

    #[test]
    fn explicit_rollback_discards_tracked_products() {
        let store = store_with_batch("OMINOUS-MIRROR", 100);
        let mut uow = StoreUnitOfWork::begin(store.clone());
        uow.products().get(&Sku::new("OMINOUS-MIRROR")).unwrap();

        uow.rollback();
        uow.commit().unwrap();

        assert_eq!(uow.products().seen_count(), 0);
    }

    #[test]
    fn collect_new_events_drains_seen_products() {
        let store = store_with_batch("POPULAR-CURTAINS", 9);
        let mut uow = StoreUnitOfWork::begin(store);
        let line = OrderLine::new("o1", "POPULAR-CURTAINS", 10).unwrap();
        let _ = uow
            .products()
            .get(&Sku::new("POPULAR-CURTAINS"))
            .unwrap()
            .unwrap()
            .allocate(line);

        assert_eq!(
            uow.collect_new_events(),
            vec![AllocationEvent::OutOfStock(OutOfStock {
                sku: Sku::new("POPULAR-CURTAINS")
            })]
        );
        assert!(uow.collect_new_events().is_empty());
    }

    #[test]
    fn concurrent_sessions_conflict_on_commit() {
        let store = store_with_batch("SHARED-SKU", 100);
        let sku = Sku::new("SHARED-SKU");

        let mut first = StoreUnitOfWork::begin(store.clone());
        let mut second = StoreUnitOfWork::begin(store.clone());
        for (uow, order) in [(&mut first, "o1"), (&mut second, "o2")] {
            let line = OrderLine::new(order, "SHARED-SKU", 10).unwrap();
            uow.products().get(&sku).unwrap().unwrap().allocate(line).unwrap();
        }

        first.commit().unwrap();
        let err = second.commit().unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
