//! Single-threaded message bus.
//!
//! The bus owns a FIFO queue seeded with one incoming message and processes it
//! to exhaustion:
//!
//! ```text
//! incoming ──► [queue] ──► handler(msg, fresh unit of work)
//!                 ▲                     │
//!                 └── harvested events ◄┘
//! ```
//!
//! - A **command** has exactly one handler. A missing handler or a failing
//!   handler makes the whole dispatch fail.
//! - An **event** has zero or more handlers. Each one runs inside its own
//!   failure boundary; errors are logged and the cascade carries on.
//! - After *every* handler invocation, events raised by the aggregates that
//!   handler's unit of work has seen are appended to the back of the queue.
//!
//! Each handler invocation gets its own unit of work from the factory, so the
//! steps of a cascade commit (or roll back) independently.

use std::collections::VecDeque;

use thiserror::Error;
use uuid::Uuid;

use crate::{Command, Event, HandlerRegistry, Message};

/// Something that can hand over the events raised during its lifetime.
///
/// Implemented by units of work: draining returns the pending events of every
/// aggregate the unit of work has seen, in the order they were raised, and
/// clears them.
pub trait EventSource<E> {
    fn collect_new_events(&mut self) -> Vec<E>;
}

#[derive(Debug, Error)]
pub enum BusError<E> {
    /// A command arrived that nobody handles.
    #[error("no handler registered for command `{message_type}`")]
    NoHandler { message_type: &'static str },

    /// The command handler failed; the dispatch is aborted.
    #[error("handler for `{message_type}` failed: {source}")]
    Handler {
        message_type: &'static str,
        #[source]
        source: E,
    },

    /// The cascade went deeper than the configured guard allows.
    #[error("cascade exceeded depth {limit} while handling `{message_type}`")]
    CascadeLimitExceeded {
        limit: usize,
        message_type: &'static str,
    },
}

impl<E> BusError<E> {
    /// The command handler's own error, if that is what failed.
    pub fn handler_error(&self) -> Option<&E> {
        match self {
            BusError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn into_handler_error(self) -> Option<E> {
        match self {
            BusError::Handler { source, .. } => Some(source),
            _ => None,
        }
    }
}

type UnitOfWorkFactory<U> = Box<dyn Fn() -> U + Send + Sync>;

/// Command/event dispatcher with cascade harvesting.
///
/// Generic parameters:
/// - `C` / `E`: the command and event enums
/// - `U`: unit of work handed to handlers (one fresh instance per invocation)
/// - `R`: command handler result
/// - `Er`: handler error
pub struct MessageBus<C, E, U, R, Er> {
    registry: HandlerRegistry<C, E, U, R, Er>,
    unit_of_work: UnitOfWorkFactory<U>,
    max_cascade_depth: Option<usize>,
}

impl<C, E, U, R, Er> core::fmt::Debug for MessageBus<C, E, U, R, Er> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageBus")
            .field("registry", &self.registry)
            .field("max_cascade_depth", &self.max_cascade_depth)
            .finish_non_exhaustive()
    }
}

impl<C, E, U, R, Er> MessageBus<C, E, U, R, Er>
where
    C: Command,
    E: Event,
    U: EventSource<E>,
    Er: core::fmt::Display,
{
    pub fn new(
        registry: HandlerRegistry<C, E, U, R, Er>,
        unit_of_work: impl Fn() -> U + Send + Sync + 'static,
    ) -> Self {
        Self {
            registry,
            unit_of_work: Box::new(unit_of_work),
            max_cascade_depth: None,
        }
    }

    /// Abort dispatches whose cascade goes deeper than `limit`.
    ///
    /// The incoming message has depth 0 and every harvested event is one
    /// deeper than the message whose handler raised it. `None` (the default)
    /// means no limit.
    pub fn with_max_cascade_depth(mut self, limit: Option<usize>) -> Self {
        self.max_cascade_depth = limit;
        self
    }

    pub fn registry(&self) -> &HandlerRegistry<C, E, U, R, Er> {
        &self.registry
    }

    pub fn max_cascade_depth(&self) -> Option<usize> {
        self.max_cascade_depth
    }

    /// Handle one external command and its full cascade.
    ///
    /// Returns the command's result (exactly one entry) once the queue is
    /// empty.
    pub fn handle(&self, command: C) -> Result<Vec<R>, BusError<Er>> {
        self.handle_message(Message::Command(command))
    }

    /// Handle any message (command or event) and its full cascade.
    ///
    /// Results are collected for commands only, in processing order.
    pub fn handle_message(&self, message: Message<C, E>) -> Result<Vec<R>, BusError<Er>> {
        let span = tracing::info_span!(
            "dispatch",
            dispatch_id = %Uuid::now_v7(),
            message_type = message.message_type(),
        );
        let _entered = span.enter();

        let mut queue: VecDeque<(Message<C, E>, usize)> = VecDeque::from([(message, 0)]);
        let mut results = Vec::new();
        let mut failure = None;

        while let Some((message, depth)) = queue.pop_front() {
            if let Some(limit) = self.max_cascade_depth {
                if depth > limit {
                    let message_type = message.message_type();
                    tracing::error!(limit, message_type, "cascade depth exceeded; aborting dispatch");
                    return Err(BusError::CascadeLimitExceeded {
                        limit,
                        message_type,
                    });
                }
            }

            match message {
                Message::Command(command) => match self.handle_command(&command, depth, &mut queue) {
                    Ok(result) => results.push(result),
                    // Events the failed handler raised (e.g. an out-of-stock
                    // notice) still run; the error is returned once they drain.
                    Err(err) => failure = Some(err),
                },
                Message::Event(event) => self.handle_event(&event, depth, &mut queue),
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }

    fn handle_command(
        &self,
        command: &C,
        depth: usize,
        queue: &mut VecDeque<(Message<C, E>, usize)>,
    ) -> Result<R, BusError<Er>> {
        let message_type = command.command_type();
        let handler = self
            .registry
            .command_handler(message_type)
            .ok_or(BusError::NoHandler { message_type })?;

        tracing::debug!(message_type, depth, "handling command");

        let mut uow = (self.unit_of_work)();
        let outcome = handler(command, &mut uow);
        enqueue(queue, uow.collect_new_events(), depth + 1);

        outcome.map_err(|source| {
            tracing::warn!(message_type, error = %source, "command handler failed");
            BusError::Handler {
                message_type,
                source,
            }
        })
    }

    fn handle_event(&self, event: &E, depth: usize, queue: &mut VecDeque<(Message<C, E>, usize)>) {
        let event_type = event.event_type();
        if self.registry.subscriber_count(event_type) == 0 {
            tracing::debug!(event_type, "no handlers subscribed; event dropped");
            return;
        }

        for (name, handler) in self.registry.event_handlers(event_type) {
            tracing::debug!(event_type, handler = name, depth, "handling event");

            let mut uow = (self.unit_of_work)();
            if let Err(err) = handler(event, &mut uow) {
                tracing::error!(event_type, handler = name, error = %err, "event handler failed");
            }
            enqueue(queue, uow.collect_new_events(), depth + 1);
        }
    }
}

fn enqueue<C, E>(queue: &mut VecDeque<(Message<C, E>, usize)>, events: Vec<E>, depth: usize) {
    queue.extend(events.into_iter().map(|e| (Message::Event(e), depth)));
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum TestCommand {
        Start,
        Broken,
        Unwired,
    }

    impl Command for TestCommand {
        fn command_type(&self) -> &'static str {
            match self {
                TestCommand::Start => "test.start",
                TestCommand::Broken => "test.broken",
                TestCommand::Unwired => "test.unwired",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        Ping(u32),
        Pong(u32),
        Echo,
    }

    impl Event for TestEvent {
        fn event_type(&self) -> &'static str {
            match self {
                TestEvent::Ping(_) => "test.ping",
                TestEvent::Pong(_) => "test.pong",
                TestEvent::Echo => "test.echo",
            }
        }
    }

    #[derive(Debug, Default)]
    struct TestUnitOfWork {
        raised: Vec<TestEvent>,
    }

    impl EventSource<TestEvent> for TestUnitOfWork {
        fn collect_new_events(&mut self) -> Vec<TestEvent> {
            std::mem::take(&mut self.raised)
        }
    }

    #[derive(Debug, Error)]
    #[error("boom: {0}")]
    struct Boom(&'static str);

    type Registry = HandlerRegistry<TestCommand, TestEvent, TestUnitOfWork, &'static str, Boom>;
    type Log = Arc<Mutex<Vec<String>>>;

    fn record(log: &Log, entry: impl Into<String>) {
        log.lock().unwrap().push(entry.into());
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// start -> ping(1), ping(2); ping(n) -> pong(n); broken raises ping(9) then fails.
    fn wired_registry(log: &Log) -> Registry {
        let mut registry = Registry::new();

        let l = log.clone();
        registry
            .register_command("test.start", move |_, uow| {
                record(&l, "start");
                uow.raised.push(TestEvent::Ping(1));
                uow.raised.push(TestEvent::Ping(2));
                Ok("started")
            })
            .unwrap();

        let l = log.clone();
        registry
            .register_command("test.broken", move |_, uow| {
                record(&l, "broken");
                uow.raised.push(TestEvent::Ping(9));
                Err(Boom("broken command"))
            })
            .unwrap();

        let l = log.clone();
        registry.subscribe("test.ping", "reply", move |event, uow| {
            if let TestEvent::Ping(n) = event {
                record(&l, format!("ping{n}"));
                uow.raised.push(TestEvent::Pong(*n));
            }
            Ok(())
        });

        let l = log.clone();
        registry.subscribe("test.pong", "log", move |event, _| {
            if let TestEvent::Pong(n) = event {
                record(&l, format!("pong{n}"));
            }
            Ok(())
        });

        registry
    }

    fn bus(registry: Registry) -> MessageBus<TestCommand, TestEvent, TestUnitOfWork, &'static str, Boom> {
        MessageBus::new(registry, TestUnitOfWork::default)
    }

    #[test]
    fn command_result_is_returned_once_after_cascade_drains() {
        let log = Log::default();
        let bus = bus(wired_registry(&log));

        let results = bus.handle(TestCommand::Start).unwrap();

        assert_eq!(results, vec!["started"]);
        assert_eq!(entries(&log), vec!["start", "ping1", "ping2", "pong1", "pong2"]);
    }

    #[test]
    fn event_handler_failure_does_not_stop_siblings_or_cascade() {
        let log = Log::default();
        let mut registry = wired_registry(&log);
        registry.subscribe("test.ping", "failing", |_, _| Err(Boom("event handler")));
        let l = log.clone();
        registry.subscribe("test.ping", "after-failure", move |_, _| {
            record(&l, "after");
            Ok(())
        });

        let results = bus(registry).handle(TestCommand::Start).unwrap();

        assert_eq!(results, vec!["started"]);
        assert_eq!(
            entries(&log),
            vec!["start", "ping1", "after", "ping2", "after", "pong1", "pong2"]
        );
    }

    #[test]
    fn failed_command_returns_error_after_its_events_drain() {
        let log = Log::default();
        let bus = bus(wired_registry(&log));

        let err = bus.handle(TestCommand::Broken).unwrap_err();

        match &err {
            BusError::Handler { message_type, source } => {
                assert_eq!(*message_type, "test.broken");
                assert_eq!(source.0, "broken command");
            }
            _ => panic!("Expected Handler error"),
        }
        assert_eq!(entries(&log), vec!["broken", "ping9", "pong9"]);
    }

    #[test]
    fn command_without_handler_is_fatal() {
        let log = Log::default();
        let err = bus(wired_registry(&log)).handle(TestCommand::Unwired).unwrap_err();

        assert!(matches!(err, BusError::NoHandler { message_type: "test.unwired" }));
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn event_without_subscribers_is_dropped_quietly() {
        let log = Log::default();
        let results = bus(wired_registry(&log))
            .handle_message(Message::Event(TestEvent::Echo))
            .unwrap();

        assert!(results.is_empty());
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn every_handler_invocation_gets_a_fresh_unit_of_work() {
        let log = Log::default();
        let opened = Arc::new(AtomicUsize::new(0));
        let counter = opened.clone();
        let bus = MessageBus::new(wired_registry(&log), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            TestUnitOfWork::default()
        });

        bus.handle(TestCommand::Start).unwrap();

        // start + ping1 + ping2 + pong1 + pong2
        assert_eq!(opened.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn cascade_guard_stops_self_perpetuating_events() {
        let mut registry = Registry::new();
        registry
            .register_command("test.start", |_, uow| {
                uow.raised.push(TestEvent::Echo);
                Ok("started")
            })
            .unwrap();
        registry.subscribe("test.echo", "echo-forever", |_, uow| {
            uow.raised.push(TestEvent::Echo);
            Ok(())
        });

        let err = bus(registry)
            .with_max_cascade_depth(Some(3))
            .handle(TestCommand::Start)
            .unwrap_err();

        match err {
            BusError::CascadeLimitExceeded { limit, message_type } => {
                assert_eq!(limit, 3);
                assert_eq!(message_type, "test.echo");
            }
            _ => panic!("Expected CascadeLimitExceeded"),
        }
    }

    #[test]
    fn buses_with_distinct_registries_are_independent() {
        let log_a = Log::default();
        let log_b = Log::default();
        let bus_a = bus(wired_registry(&log_a));

        let mut registry_b = Registry::new();
        let l = log_b.clone();
        registry_b
            .register_command("test.start", move |_, _| {
                record(&l, "b-start");
                Ok("b")
            })
            .unwrap();
        let bus_b = bus(registry_b);

        assert_eq!(bus_b.handle(TestCommand::Start).unwrap(), vec!["b"]);
        assert!(bus_b.handle(TestCommand::Broken).is_err());
        assert_eq!(entries(&log_b), vec!["b-start"]);
        assert!(entries(&log_a).is_empty());

        assert_eq!(bus_a.handle(TestCommand::Start).unwrap(), vec!["started"]);
    }
}
