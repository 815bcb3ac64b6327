//! Wiring: builds the handler registry and the message bus over a store.

use std::sync::Arc;

use stockline_allocation::{Allocate, AllocationCommand, AllocationEvent, CreateBatch};
use stockline_core::BatchRef;
use stockline_events::{Command, Event, HandlerRegistry, MessageBus, RegistrationError};

use crate::config::AllocationConfig;
use crate::handlers::{self, HandlerError};
use crate::notifications::Notifier;
use crate::store::{InMemoryProductStore, ProductStore};
use crate::unit_of_work::{StoreUnitOfWork, UnitOfWork};

/// Command handlers return the chosen batch for `Allocate` and nothing otherwise.
pub type CommandOutcome = Option<BatchRef>;

pub type AllocationRegistry<U> =
    HandlerRegistry<AllocationCommand, AllocationEvent, U, CommandOutcome, HandlerError>;

pub type AllocationBus<U> =
    MessageBus<AllocationCommand, AllocationEvent, U, CommandOutcome, HandlerError>;

pub type InMemoryUnitOfWork = StoreUnitOfWork<Arc<InMemoryProductStore>>;

/// Dispatch table for the allocation service.
///
/// Commands: `CreateBatch`, `Allocate`, `ChangeBatchQuantity`.
/// Events: `BatchCreated` -> add batch, `AllocationRequired` -> allocate,
/// `OutOfStock` -> notify `config.notify_address`.
pub fn build_registry<U>(
    notifier: Arc<dyn Notifier>,
    config: &AllocationConfig,
) -> Result<AllocationRegistry<U>, RegistrationError>
where
    U: UnitOfWork + 'static,
{
    let mut registry = AllocationRegistry::new();

    registry.register_command(AllocationCommand::CREATE_BATCH, |cmd, uow| match cmd {
        AllocationCommand::CreateBatch(c) => handlers::add_batch(c, uow).map(|()| None),
        other => Err(HandlerError::unexpected("add_batch", other.command_type())),
    })?;
    registry.register_command(AllocationCommand::ALLOCATE, |cmd, uow| match cmd {
        AllocationCommand::Allocate(c) => handlers::allocate(c, uow).map(Some),
        other => Err(HandlerError::unexpected("allocate", other.command_type())),
    })?;
    registry.register_command(AllocationCommand::CHANGE_BATCH_QUANTITY, |cmd, uow| match cmd {
        AllocationCommand::ChangeBatchQuantity(c) => {
            handlers::change_batch_quantity(c, uow).map(|()| None)
        }
        other => Err(HandlerError::unexpected("change_batch_quantity", other.command_type())),
    })?;

    registry.subscribe(AllocationEvent::BATCH_CREATED, "add_batch", |event, uow| match event {
        AllocationEvent::BatchCreated(e) => handlers::add_batch(&CreateBatch::from(e), uow),
        other => Err(HandlerError::unexpected("add_batch", other.event_type())),
    });
    registry.subscribe(
        AllocationEvent::ALLOCATION_REQUIRED,
        "allocate",
        |event, uow| match event {
            AllocationEvent::AllocationRequired(e) => {
                handlers::allocate(&Allocate::from(e), uow).map(|_| ())
            }
            other => Err(HandlerError::unexpected("allocate", other.event_type())),
        },
    );

    let to = config.notify_address.clone();
    registry.subscribe(
        AllocationEvent::OUT_OF_STOCK,
        "send_out_of_stock_notification",
        move |event, _uow| match event {
            AllocationEvent::OutOfStock(e) => {
                handlers::send_out_of_stock_notification(e, &*notifier, &to)
            }
            other => Err(HandlerError::unexpected(
                "send_out_of_stock_notification",
                other.event_type(),
            )),
        },
    );

    Ok(registry)
}

/// Build a ready-to-use bus. Every handler invocation gets a fresh unit of
/// work over `store`.
pub fn bootstrap<S>(
    store: S,
    notifier: Arc<dyn Notifier>,
    config: &AllocationConfig,
) -> Result<AllocationBus<StoreUnitOfWork<S>>, RegistrationError>
where
    S: ProductStore + Clone + 'static,
{
    let registry = build_registry(notifier, config)?;
    tracing::info!(
        notify_address = %config.notify_address,
        max_cascade_depth = ?config.max_cascade_depth,
        "allocation bus wired"
    );

    Ok(
        MessageBus::new(registry, move || StoreUnitOfWork::begin(store.clone()))
            .with_max_cascade_depth(config.max_cascade_depth),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::LogNotifier;

    #[test]
    fn registry_wires_every_message() {
        let registry: AllocationRegistry<InMemoryUnitOfWork> =
            build_registry(Arc::new(LogNotifier), &AllocationConfig::default()).unwrap();

        for command in [
            AllocationCommand::ALLOCATE,
            AllocationCommand::CREATE_BATCH,
            AllocationCommand::CHANGE_BATCH_QUANTITY,
        ] {
            assert!(registry.handles_command(command), "{command} is not wired");
        }
        for event in [
            AllocationEvent::BATCH_CREATED,
            AllocationEvent::ALLOCATION_REQUIRED,
            AllocationEvent::OUT_OF_STOCK,
        ] {
            assert_eq!(registry.subscriber_count(event), 1, "{event} is not wired");
        }
    }

    #[test]
    fn bus_takes_cascade_guard_from_config() {
        let config = AllocationConfig::default().with_max_cascade_depth(Some(3));
        let bus = bootstrap(Arc::new(InMemoryProductStore::new()), Arc::new(LogNotifier), &config)
            .unwrap();
        assert_eq!(bus.max_cascade_depth(), Some(3));
    }
}
