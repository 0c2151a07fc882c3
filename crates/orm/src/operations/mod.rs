//! Caller API inside `autocommit`, `read_only` and `transaction` blocks
//!
//! A [`QueryConnection`] groups the statements by what they act on:
//! `schema()`, `table()`, `row()`, `batch()`, `query()` and `procedure()`.
//! Each group borrows the connection for as long as it is used.

pub mod batch;
pub mod procedure;
pub mod raw;
pub mod row;
pub mod schema;
pub mod table;

use std::ops::{Deref, DerefMut};

use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::transactions::{Rollback, SavepointState};

pub use batch::BatchQueries;
pub use procedure::ProcedureQueries;
pub use raw::{MultiResult, RawQueries};
pub use row::RowQueries;
pub use schema::SchemaQueries;
pub use table::TableQueries;

/// Connection handed to an `autocommit` or `read_only` block
pub struct QueryConnection<'q> {
    catalog: &'q Catalog,
    engine: Engine<'q>,
}

impl<'q> QueryConnection<'q> {
    pub fn new(catalog: &'q Catalog, engine: Engine<'q>) -> Self {
        Self { catalog, engine }
    }

    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    pub fn schema(&mut self) -> SchemaQueries<'_> {
        SchemaQueries::new(self.catalog, self.engine.reborrow())
    }

    pub fn table(&mut self) -> TableQueries<'_> {
        TableQueries::new(self.catalog, self.engine.reborrow())
    }

    pub fn row(&mut self) -> RowQueries<'_> {
        RowQueries::new(self.catalog, self.engine.reborrow())
    }

    pub fn batch(&mut self) -> BatchQueries<'_> {
        BatchQueries::new(self.catalog, self.engine.reborrow())
    }

    pub fn query(&mut self) -> RawQueries<'_> {
        RawQueries::new(self.catalog, self.engine.reborrow())
    }

    pub fn procedure(&mut self) -> ProcedureQueries<'_> {
        ProcedureQueries::new(self.catalog, self.engine.reborrow())
    }
}

/// Connection handed to a `transaction` block
pub struct TransactionConnection<'q> {
    conn: QueryConnection<'q>,
    savepoints: SavepointState,
}

impl<'q> TransactionConnection<'q> {
    pub fn new(catalog: &'q Catalog, engine: Engine<'q>) -> Self {
        Self {
            conn: QueryConnection::new(catalog, engine),
            savepoints: SavepointState::new(),
        }
    }

    /// Savepoints and rollbacks of this transaction
    pub fn rollback(&mut self) -> Rollback<'_> {
        Rollback::new(self.conn.engine.reborrow(), &mut self.savepoints)
    }
}

impl<'q> Deref for TransactionConnection<'q> {
    type Target = QueryConnection<'q>;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl<'q> DerefMut for TransactionConnection<'q> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}
