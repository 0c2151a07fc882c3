use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::OrmResult;
use crate::schema::{Entity, EntityDescriptor};

use super::raw::MultiResult;

/// Stored procedure statements, unsupported on SQLite
pub struct ProcedureQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> ProcedureQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    /// Create procedure `P` with `body` between its `BEGIN` and `END`
    pub fn create<P: Entity>(&mut self, body: &str) -> OrmResult<u64> {
        let query = self.catalog.create_procedure::<P>(body)?;
        self.engine.update(&query)
    }

    pub fn drop<P: Entity>(&mut self) -> OrmResult<u64> {
        let query = self.catalog.drop_procedure::<P>()?;
        self.engine.update(&query)
    }

    /// Call a procedure and decode its first result set into `OUT`
    pub fn call<P: Entity, OUT: Entity>(&mut self, procedure: &P) -> OrmResult<Vec<OUT>> {
        let query = self.catalog.call_procedure(procedure)?;
        let first = self.engine.call(&query)?.into_iter().next().unwrap_or_default();
        self.catalog.mapper().decode_many(first)
    }

    /// Call a procedure returning one result set per entry of `outputs`
    pub fn call_many<P: Entity>(
        &mut self,
        procedure: &P,
        outputs: &[EntityDescriptor],
    ) -> OrmResult<MultiResult<'a>> {
        let query = self.catalog.call_procedure(procedure)?;
        let results = self.engine.call(&query)?;
        MultiResult::new(self.catalog, outputs, results)
    }
}
