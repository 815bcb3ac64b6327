/// A request to change the system (command abstraction).
///
/// Commands express **intent** and are handled by exactly one handler. When
/// the handler fails, the failure is returned to whoever sent the command.
///
/// Implementors are usually enums; `command_type` is the explicit
/// discriminant the bus uses to find the handler, so every variant must map
/// to a stable, unique name (e.g. `"allocation.allocate"`).
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn command_type(&self) -> &'static str;
}
