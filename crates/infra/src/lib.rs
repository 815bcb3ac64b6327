//! Infrastructure layer: storage, unit of work, handlers and service wiring.

pub mod bootstrap;
pub mod config;
pub mod entrypoint;
pub mod handlers;
pub mod notifications;
pub mod repository;
pub mod store;
pub mod unit_of_work;


pub use bootstrap::{AllocationBus, InMemoryUnitOfWork, bootstrap, build_registry};
pub use config::AllocationConfig;
pub use entrypoint::{Entrypoint, Response};
pub use handlers::HandlerError;
pub use notifications::{LogNotifier, NotificationError, Notifier};
pub use store::{InMemoryProductStore, ProductStore, StoreError};
pub use unit_of_work::{StoreUnitOfWork, UnitOfWork};
