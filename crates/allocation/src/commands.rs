use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockline_core::{BatchRef, OrderId, Sku};
use stockline_events::Command;

/// Command: Allocate an order line to the best available batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub qty: u32,
}

/// Command: CreateBatch (register purchased stock).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub reference: BatchRef,
    pub sku: Sku,
    pub qty: u32,
    /// `None` means the stock is already in the warehouse.
    pub eta: Option<NaiveDate>,
}

/// Command: ChangeBatchQuantity (upstream supply changed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    pub reference: BatchRef,
    pub qty: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AllocationCommand {
    Allocate(Allocate),
    CreateBatch(CreateBatch),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

impl AllocationCommand {
    pub const ALLOCATE: &'static str = "allocation.allocate";
    pub const CREATE_BATCH: &'static str = "allocation.create_batch";
    pub const CHANGE_BATCH_QUANTITY: &'static str = "allocation.change_batch_quantity";
}

impl Command for AllocationCommand {
    fn command_type(&self) -> &'static str {
        match self {
            AllocationCommand::Allocate(_) => Self::ALLOCATE,
            AllocationCommand::CreateBatch(_) => Self::CREATE_BATCH,
            AllocationCommand::ChangeBatchQuantity(_) => Self::CHANGE_BATCH_QUANTITY,
        }
    }
}

impl From<Allocate> for AllocationCommand {
    fn from(value: Allocate) -> Self {
        AllocationCommand::Allocate(value)
    }
}

impl From<CreateBatch> for AllocationCommand {
    fn from(value: CreateBatch) -> Self {
        AllocationCommand::CreateBatch(value)
    }
}

impl From<ChangeBatchQuantity> for AllocationCommand {
    fn from(value: ChangeBatchQuantity) -> Self {
        AllocationCommand::ChangeBatchQuantity(value)
    }
}
