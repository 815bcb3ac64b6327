use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockline_core::{BatchRef, OrderId, Sku};
use stockline_events::Event;

use crate::batch::OrderLine;
use crate::commands::{Allocate, CreateBatch};

/// Event: BatchCreated (seeds a batch; handled like `CreateBatch`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub reference: BatchRef,
    pub sku: Sku,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

/// Event: AllocationRequired (a line lost its batch and must be re-allocated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequired {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// Event: OutOfStock (no batch could satisfy a line).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationEvent {
    BatchCreated(BatchCreated),
    AllocationRequired(AllocationRequired),
    OutOfStock(OutOfStock),
}

impl AllocationEvent {
    pub const BATCH_CREATED: &'static str = "allocation.batch_created";
    pub const ALLOCATION_REQUIRED: &'static str = "allocation.allocation_required";
    pub const OUT_OF_STOCK: &'static str = "allocation.out_of_stock";
}

impl Event for AllocationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            AllocationEvent::BatchCreated(_) => Self::BATCH_CREATED,
            AllocationEvent::AllocationRequired(_) => Self::ALLOCATION_REQUIRED,
            AllocationEvent::OutOfStock(_) => Self::OUT_OF_STOCK,
        }
    }
}

impl From<OrderLine> for AllocationRequired {
    fn from(line: OrderLine) -> Self {
        let (order_id, sku, qty) = line.into_parts();
        Self { order_id, sku, qty }
    }
}

impl From<&BatchCreated> for CreateBatch {
    fn from(e: &BatchCreated) -> Self {
        Self {
            reference: e.reference.clone(),
            sku: e.sku.clone(),
            qty: e.qty,
            eta: e.eta,
        }
    }
}

impl From<&AllocationRequired> for Allocate {
    fn from(e: &AllocationRequired) -> Self {
        Self {
            order_id: e.order_id.clone(),
            sku: e.sku.clone(),
            qty: e.qty,
        }
    }
}
