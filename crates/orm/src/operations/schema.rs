use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::OrmResult;

/// Schema statements, unsupported on SQLite
pub struct SchemaQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> SchemaQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    pub fn create(&mut self, schema: &str) -> OrmResult<u64> {
        let query = self.catalog.create_schema(schema)?;
        self.engine.update(&query)
    }

    pub fn drop(&mut self, schema: &str) -> OrmResult<u64> {
        let query = self.catalog.drop_schema(schema, false)?;
        self.engine.update(&query)
    }

    pub fn drop_cascade(&mut self, schema: &str) -> OrmResult<u64> {
        let query = self.catalog.drop_schema(schema, true)?;
        self.engine.update(&query)
    }
}
