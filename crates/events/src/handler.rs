//! Handler dispatch table.
//!
//! The registry maps a message discriminant (`Command::command_type` /
//! `Event::event_type`) to the handlers for that message. It is built once,
//! when the bus is wired, and then owned by that bus; there is no global
//! handler table, so two buses can run with different wiring side by side.

use std::collections::HashMap;

use thiserror::Error;

use crate::{Command, Event};

/// Handler for a command: receives a fresh unit of work and returns a result.
pub type CommandHandlerFn<C, U, R, Er> = Box<dyn Fn(&C, &mut U) -> Result<R, Er> + Send + Sync>;

/// Handler for an event. Its result is only used for logging.
pub type EventHandlerFn<E, U, Er> = Box<dyn Fn(&E, &mut U) -> Result<(), Er> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Commands have exactly one handler.
    #[error("a handler is already registered for command `{0}`")]
    DuplicateCommandHandler(&'static str),
}

struct Subscriber<E, U, Er> {
    name: &'static str,
    handler: EventHandlerFn<E, U, Er>,
}

/// Dispatch table: one handler per command type, an ordered list per event type.
pub struct HandlerRegistry<C, E, U, R, Er> {
    commands: HashMap<&'static str, CommandHandlerFn<C, U, R, Er>>,
    events: HashMap<&'static str, Vec<Subscriber<E, U, Er>>>,
}

impl<C, E, U, R, Er> Default for HandlerRegistry<C, E, U, R, Er> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }
}

impl<C, E, U, R, Er> core::fmt::Debug for HandlerRegistry<C, E, U, R, Er> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut commands: Vec<_> = self.commands.keys().collect();
        commands.sort();
        let mut events: Vec<_> = self
            .events
            .iter()
            .map(|(ty, subs)| (*ty, subs.iter().map(|s| s.name).collect::<Vec<_>>()))
            .collect();
        events.sort();
        f.debug_struct("HandlerRegistry")
            .field("commands", &commands)
            .field("events", &events)
            .finish()
    }
}

impl<C, E, U, R, Er> HandlerRegistry<C, E, U, R, Er>
where
    C: Command,
    E: Event,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for a command type.
    pub fn register_command<F>(
        &mut self,
        command_type: &'static str,
        handler: F,
    ) -> Result<(), RegistrationError>
    where
        F: Fn(&C, &mut U) -> Result<R, Er> + Send + Sync + 'static,
    {
        if self.commands.contains_key(command_type) {
            return Err(RegistrationError::DuplicateCommandHandler(command_type));
        }
        self.commands.insert(command_type, Box::new(handler));
        Ok(())
    }

    /// Append a handler for an event type. Handlers run in subscription order.
    pub fn subscribe<F>(&mut self, event_type: &'static str, name: &'static str, handler: F)
    where
        F: Fn(&E, &mut U) -> Result<(), Er> + Send + Sync + 'static,
    {
        self.events.entry(event_type).or_default().push(Subscriber {
            name,
            handler: Box::new(handler),
        });
    }

    pub fn command_handler(&self, command_type: &str) -> Option<&CommandHandlerFn<C, U, R, Er>> {
        self.commands.get(command_type)
    }

    /// Handlers for an event type as `(name, handler)` pairs, in subscription order.
    pub fn event_handlers(
        &self,
        event_type: &str,
    ) -> impl Iterator<Item = (&'static str, &EventHandlerFn<E, U, Er>)> {
        self.events
            .get(event_type)
            .into_iter()
            .flatten()
            .map(|s| (s.name, &s.handler))
    }

    pub fn handles_command(&self, command_type: &str) -> bool {
        self.commands.contains_key(command_type)
    }

    pub fn subscriber_count(&self, event_type: &str) -> usize {
        self.events.get(event_type).map_or(0, Vec::len)
    }
}
