//! Transaction Management
//!
//! Transactions are scoped blocks run by [`Service`](crate::Service). This
//! module holds their options, isolation levels and savepoints.

pub mod isolation;
pub mod savepoints;

pub use isolation::IsolationLevel;
pub(crate) use savepoints::SavepointState;
pub use savepoints::{Rollback, Savepoint};

/// Options applied when a transaction begins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionConfig {
    /// `None` runs at the dialect's default level
    pub isolation_level: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}
