//! Message handlers: the bridge between commands/events and the `Product`
//! aggregate.
//!
//! Every handler receives its own unit of work, does one piece of work and
//! commits explicitly. Events raised along the way are left on the aggregates
//! for the bus to harvest.

use thiserror::Error;

use stockline_allocation::{
    Allocate, AllocationError, Batch, ChangeBatchQuantity, CreateBatch, OrderLine, OutOfStock,
};
use stockline_core::{BatchRef, DomainError, Sku};

use crate::notifications::{NotificationError, Notifier};
use crate::repository::ProductRepository;
use crate::store::StoreError;
use crate::unit_of_work::UnitOfWork;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// The SKU has no product (no batch was ever created for it).
    #[error("Invalid sku {0}")]
    InvalidSku(Sku),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    /// Wiring error: a handler was registered for the wrong message type.
    #[error("handler `{handler}` cannot handle `{message_type}`")]
    UnexpectedMessage {
        handler: &'static str,
        message_type: &'static str,
    },
}

impl HandlerError {
    pub fn unexpected(handler: &'static str, message_type: &'static str) -> Self {
        Self::UnexpectedMessage {
            handler,
            message_type,
        }
    }
}

/// Register a batch, creating the product on first sight of its SKU.
pub fn add_batch<U>(cmd: &CreateBatch, uow: &mut U) -> Result<(), HandlerError>
where
    U: UnitOfWork,
{
    let product = uow.products().get_or_create(&cmd.sku)?;
    product.add_batch(Batch::new(cmd.reference.clone(), cmd.sku.clone(), cmd.qty, cmd.eta))?;
    uow.commit()?;
    Ok(())
}

/// Allocate an order line and return the chosen batch.
pub fn allocate<U>(cmd: &Allocate, uow: &mut U) -> Result<BatchRef, HandlerError>
where
    U: UnitOfWork,
{
    let line = OrderLine::new(cmd.order_id.clone(), cmd.sku.clone(), cmd.qty)?;
    let product = uow
        .products()
        .get(&cmd.sku)?
        .ok_or_else(|| HandlerError::InvalidSku(cmd.sku.clone()))?;
    let batchref = product.allocate(line)?;
    uow.commit()?;
    Ok(batchref)
}

/// Apply an upstream quantity change to the batch's product.
pub fn change_batch_quantity<U>(cmd: &ChangeBatchQuantity, uow: &mut U) -> Result<(), HandlerError>
where
    U: UnitOfWork,
{
    let product = uow
        .products()
        .get_by_batchref(&cmd.reference)?
        .ok_or_else(|| AllocationError::UnknownBatch(cmd.reference.clone()))?;
    product.change_batch_quantity(&cmd.reference, cmd.qty)?;
    uow.commit()?;
    Ok(())
}

pub fn out_of_stock_subject(sku: &Sku) -> String {
    format!("Out of stock for {sku}")
}

/// Tell the stock team a SKU ran out. Touches no aggregate.
pub fn send_out_of_stock_notification(
    event: &OutOfStock,
    notifier: &dyn Notifier,
    to: &str,
) -> Result<(), HandlerError> {
    notifier.send(to, &out_of_stock_subject(&event.sku))?;
    Ok(())
}
