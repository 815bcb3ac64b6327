use crate::{Command, Event};

/// Anything the bus can put on its queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message<C, E> {
    Command(C),
    Event(E),
}

impl<C, E> Message<C, E>
where
    C: Command,
    E: Event,
{
    /// Discriminant used for handler lookup and logging.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Command(c) => c.command_type(),
            Message::Event(e) => e.event_type(),
        }
    }

    pub fn is_command(&self) -> bool {
        matches!(self, Message::Command(_))
    }
}
