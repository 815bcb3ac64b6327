use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockline_core::{BatchRef, DomainError, DomainResult, Entity, OrderId, Sku, ValueObject};

/// A requested quantity of one SKU for one order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    order_id: OrderId,
    sku: Sku,
    qty: u32,
}

impl OrderLine {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, qty: u32) -> DomainResult<Self> {
        if qty == 0 {
            return Err(DomainError::validation("order line quantity must be positive"));
        }
        Ok(Self {
            order_id: order_id.into(),
            sku: sku.into(),
            qty,
        })
    }

    pub fn order_id(&self) -> &OrderId {
        &self.order_id
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn qty(&self) -> u32 {
        self.qty
    }

    pub fn into_parts(self) -> (OrderId, Sku, u32) {
        (self.order_id, self.sku, self.qty)
    }
}

impl ValueObject for OrderLine {}

/// A purchased lot of stock for one SKU.
///
/// Identity is the reference alone: two `Batch` values with the same
/// reference compare equal whatever their quantities or allocations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    purchased_quantity: u32,
    eta: Option<NaiveDate>,
    allocations: BTreeSet<OrderLine>,
}

impl Batch {
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: BTreeSet::new(),
        }
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    pub fn allocated_quantity(&self) -> u64 {
        self.allocations.iter().map(|l| u64::from(l.qty)).sum()
    }

    /// Purchased minus allocated. Only negative transiently, while a quantity
    /// change is being applied.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity() as i64
    }

    pub fn allocations(&self) -> impl Iterator<Item = &OrderLine> {
        self.allocations.iter()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == line.sku && self.available_quantity() >= i64::from(line.qty)
    }

    /// Allocation preference: in-warehouse stock (no eta) first, then the
    /// soonest eta. The reference breaks ties so the choice is deterministic.
    pub fn preference_key(&self) -> (Option<NaiveDate>, &BatchRef) {
        (self.eta, &self.reference)
    }

    pub(crate) fn allocate(&mut self, line: OrderLine) {
        if self.can_allocate(&line) {
            self.allocations.insert(line);
        }
    }

    pub(crate) fn deallocate_one(&mut self) -> Option<OrderLine> {
        self.allocations.pop_first()
    }

    pub(crate) fn set_purchased_quantity(&mut self, qty: u32) {
        self.purchased_quantity = qty;
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl core::hash::Hash for Batch {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

impl Entity for Batch {
    type Id = BatchRef;

    fn id(&self) -> &Self::Id {
        &self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(order_id: &str, sku: &str, qty: u32) -> OrderLine {
        OrderLine::new(order_id, sku, qty).unwrap()
    }

    fn today() -> NaiveDate {
        chrono::Utc::now().date_naive()
    }

    #[test]
    fn order_line_rejects_zero_quantity() {
        let err = OrderLine::new("o1", "SMALL-TABLE", 0).unwrap_err();
        match err {
            DomainError::Validation(_) => {}
            _ => panic!("Expected Validation error for zero quantity"),
        }
    }

    #[test]
    fn allocating_reduces_available_quantity() {
        let mut batch = Batch::new("batch-001", "SMALL-TABLE", 20, Some(today()));
        batch.allocate(line("order-ref", "SMALL-TABLE", 2));
        assert_eq!(batch.available_quantity(), 18);
        assert_eq!(batch.allocated_quantity(), 2);
    }

    #[test]
    fn cannot_allocate_more_than_available() {
        let batch = Batch::new("batch-001", "ELEGANT-LAMP", 2, None);
        assert!(!batch.can_allocate(&line("o1", "ELEGANT-LAMP", 20)));
        assert!(batch.can_allocate(&line("o1", "ELEGANT-LAMP", 2)));
    }

    #[test]
    fn cannot_allocate_other_sku() {
        let batch = Batch::new("batch-001", "UNCOMFORTABLE-CHAIR", 100, None);
        assert!(!batch.can_allocate(&line("o1", "EXPENSIVE-TOASTER", 10)));
    }

    #[test]
    fn allocating_same_line_twice_counts_once() {
        let mut batch = Batch::new("batch-001", "ANGULAR-DESK", 20, None);
        let l = line("o1", "ANGULAR-DESK", 2);
        batch.allocate(l.clone());
        batch.allocate(l);
        assert_eq!(batch.available_quantity(), 18);
    }

    #[test]
    fn deallocate_one_releases_a_line() {
        let mut batch = Batch::new("batch-001", "DECORATIVE-TRINKET", 20, None);
        batch.allocate(line("o1", "DECORATIVE-TRINKET", 5));
        let released = batch.deallocate_one().unwrap();
        assert_eq!(released.qty(), 5);
        assert_eq!(batch.available_quantity(), 20);
        assert!(batch.deallocate_one().is_none());
    }

    #[test]
    fn batches_with_same_reference_are_equal() {
        let a = Batch::new("b1", "SKU1", 10, None);
        let b = Batch::new("b1", "SKU2", 99, Some(today()));
        assert_eq!(a, b);
        assert_eq!(Entity::id(&a), Entity::id(&b));
        assert_ne!(a, Batch::new("b2", "SKU1", 10, None));
    }

    #[test]
    fn warehouse_stock_sorts_before_shipments() {
        let in_stock = Batch::new("zzz", "SKU", 1, None);
        let shipment = Batch::new("aaa", "SKU", 1, Some(today()));
        assert!(in_stock.preference_key() < shipment.preference_key());
    }
}
