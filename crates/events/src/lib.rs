//! Command/event message mechanics: message traits, the handler dispatch
//! table and the single-threaded message bus.
//!
//! Nothing in here knows about products or batches; domain crates provide the
//! concrete command and event enums.

pub mod bus;
pub mod command;
pub mod event;
pub mod handler;
pub mod message;

pub use bus::{BusError, EventSource, MessageBus};
pub use command::Command;
pub use event::Event;
pub use handler::{CommandHandlerFn, EventHandlerFn, HandlerRegistry, RegistrationError};
pub use message::Message;
