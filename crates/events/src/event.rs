/// A fact raised by the domain while handling a message.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - handled by **zero or more** handlers, each failing in isolation
/// - **transient** here: they drive the cascade and are not stored
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "allocation.out_of_stock").
    fn event_type(&self) -> &'static str;
}
