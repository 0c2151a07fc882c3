//! Transaction Savepoints
//!
//! Savepoints are named `sp_1`, `sp_2`, ... per transaction. Rolling back
//! to a savepoint the database already discarded fails in the driver and
//! the error is returned unchanged.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::Engine;
use crate::error::{OrmError, OrmResult, QueryError};

static TRANSACTION_IDS: AtomicU64 = AtomicU64::new(1);

/// Savepoint bookkeeping of one transaction
#[derive(Debug)]
pub(crate) struct SavepointState {
    transaction: u64,
    count: u32,
}

impl SavepointState {
    pub(crate) fn new() -> Self {
        Self {
            transaction: TRANSACTION_IDS.fetch_add(1, Ordering::Relaxed),
            count: 0,
        }
    }
}

/// Handle to a savepoint of the transaction that created it
///
/// Not `Send`: it names connection-local state.
#[derive(Debug, PartialEq, Eq)]
pub struct Savepoint {
    name: String,
    transaction: u64,
    _local: PhantomData<*const ()>,
}

impl Savepoint {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Rollback operations of a running transaction
pub struct Rollback<'t> {
    engine: Engine<'t>,
    state: &'t mut SavepointState,
}

impl<'t> Rollback<'t> {
    pub(crate) fn new(engine: Engine<'t>, state: &'t mut SavepointState) -> Self {
        Self { engine, state }
    }

    fn check_owner(&self, savepoint: &Savepoint) -> OrmResult<()> {
        if savepoint.transaction != self.state.transaction {
            return Err(QueryError::ForeignSavepoint {
                name: savepoint.name.clone(),
            }
            .into());
        }
        Ok(())
    }

    /// Undo every change of the transaction
    pub fn all(mut self) -> OrmResult<()> {
        tracing::debug!("Rolling back transaction");
        self.engine
            .connection()
            .rollback()
            .map_err(|e| OrmError::command("ROLLBACK", e))
    }

    /// Undo every change made after `savepoint`
    pub fn to(mut self, savepoint: &Savepoint) -> OrmResult<()> {
        self.check_owner(savepoint)?;
        tracing::debug!("Rolling back to savepoint {}", savepoint.name);
        self.engine
            .connection()
            .rollback_to_savepoint(&savepoint.name)
            .map_err(|e| OrmError::command(format!("ROLLBACK TO SAVEPOINT {}", savepoint.name), e))
    }

    /// Forget `savepoint` and every later one, keeping their changes
    pub fn release(mut self, savepoint: Savepoint) -> OrmResult<()> {
        self.check_owner(&savepoint)?;
        tracing::debug!("Releasing savepoint {}", savepoint.name);
        self.engine
            .connection()
            .release_savepoint(&savepoint.name)
            .map_err(|e| OrmError::command(format!("RELEASE SAVEPOINT {}", savepoint.name), e))
    }

    /// Mark the current state so it can be returned to later
    pub fn save_point(mut self) -> OrmResult<Savepoint> {
        self.state.count += 1;
        let name = format!("sp_{}", self.state.count);
        self.engine
            .connection()
            .set_savepoint(&name)
            .map_err(|e| OrmError::command(format!("SAVEPOINT {}", name), e))?;
        tracing::debug!("Created savepoint {}", name);
        Ok(Savepoint {
            name,
            transaction: self.state.transaction,
            _local: PhantomData,
        })
    }
}
