//! Aggregate root traits for state-based domain models that raise events.

use crate::error::{DomainError, DomainResult};

/// Aggregate root marker + minimal interface.
pub trait AggregateRoot {
    /// Aggregate identifier (the key the repository stores it under).
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Optimistic-concurrency token.
    ///
    /// Domain operations bump it; the persistence layer decides what to do
    /// with it.
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for a stored record.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking.
    Any,
    /// Require the record to be at an exact revision (0 = absent).
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// An aggregate that records domain events while it is mutated.
///
/// Events accumulate in memory during a single operation and are drained by
/// whoever owns the aggregate's transaction (see the unit of work). They are
/// never persisted with the aggregate.
pub trait Aggregate: AggregateRoot {
    type Event: Clone + core::fmt::Debug;

    /// Events raised since the last drain, oldest first.
    fn pending_events(&self) -> &[Self::Event];

    /// Drain the pending events, leaving the buffer empty.
    fn take_events(&mut self) -> Vec<Self::Event>;
}
