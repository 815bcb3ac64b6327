use serde::{Deserialize, Serialize};

use stockline_core::{Aggregate, AggregateRoot, BatchRef, DomainError, Sku};

use crate::batch::{Batch, OrderLine};
use crate::error::AllocationError;
use crate::events::{AllocationEvent, AllocationRequired, OutOfStock};

/// Aggregate root: Product (all batches of one SKU).
///
/// The product is the consistency boundary for allocation: a line can only be
/// placed by looking at every batch of its SKU at once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,
    batches: Vec<Batch>,
    version_number: u64,
    #[serde(skip)]
    events: Vec<AllocationEvent>,
}

impl Product {
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self::with_batches(sku, Vec::new())
    }

    pub fn with_batches(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version_number: 0,
            events: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    pub fn version_number(&self) -> u64 {
        self.version_number
    }

    /// Place a batch under this product. No event is raised.
    pub fn add_batch(&mut self, batch: Batch) -> Result<(), AllocationError> {
        if batch.sku() != &self.sku {
            return Err(DomainError::invariant(format!(
                "batch {} has sku {}, product is {}",
                batch.reference(),
                batch.sku(),
                self.sku
            ))
            .into());
        }
        if self.batch(batch.reference()).is_some() {
            return Err(AllocationError::DuplicateBatch(batch.reference().clone()));
        }
        self.batches.push(batch);
        Ok(())
    }

    /// Allocate `line` to the preferred eligible batch and return its reference.
    ///
    /// A line that is already allocated stays where it is. When nothing can
    /// take the line, an `OutOfStock` event is recorded *and* the error is
    /// returned.
    pub fn allocate(&mut self, line: OrderLine) -> Result<BatchRef, AllocationError> {
        if let Some(existing) = self.batches.iter().find(|b| b.is_allocated(&line)) {
            return Ok(existing.reference().clone());
        }

        let chosen = self
            .batches
            .iter_mut()
            .filter(|b| b.can_allocate(&line))
            .min_by(|a, b| a.preference_key().cmp(&b.preference_key()));

        match chosen {
            Some(batch) => {
                batch.allocate(line);
                let reference = batch.reference().clone();
                self.version_number += 1;
                Ok(reference)
            }
            None => {
                let sku = line.sku().clone();
                self.events.push(AllocationEvent::OutOfStock(OutOfStock { sku: sku.clone() }));
                Err(AllocationError::OutOfStock(sku))
            }
        }
    }

    /// Set a batch's purchased quantity, releasing lines until it is no longer
    /// over-allocated. Each released line is recorded as `AllocationRequired`.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchRef,
        qty: u32,
    ) -> Result<(), AllocationError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| AllocationError::UnknownBatch(reference.clone()))?;

        batch.set_purchased_quantity(qty);
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            self.events
                .push(AllocationEvent::AllocationRequired(AllocationRequired::from(line)));
        }
        Ok(())
    }
}

impl AggregateRoot for Product {
    type Id = Sku;

    fn id(&self) -> &Self::Id {
        &self.sku
    }

    fn version(&self) -> u64 {
        self.version_number
    }
}

impl Aggregate for Product {
    type Event = AllocationEvent;

    fn pending_events(&self) -> &[Self::Event] {
        &self.events
    }

    fn take_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.events)
    }
}
