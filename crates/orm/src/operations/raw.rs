//! Hand-written SQL
//!
//! The SQL is produced by a closure receiving a [`SqlBuilder`], or a
//! [`QueryBuilder`] when values of an input entity are bound. Caller values
//! only reach the statement through `QueryBuilder::input`.

use std::any::TypeId;
use std::vec;

use crate::backends::Row;
use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::{OrmResult, QueryError};
use crate::query::{Query, QueryBuilder, SqlBuilder};
use crate::schema::{Entity, EntityDescriptor};

pub struct RawQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> RawQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    /// Execute one or more statements, discarding any result sets
    pub fn run<F>(&mut self, build: F) -> OrmResult<()>
    where
        F: FnOnce(SqlBuilder<'_>) -> OrmResult<String>,
    {
        let query = Query::new(build(SqlBuilder::new(self.catalog))?);
        self.engine.query_multi(&query).map(|_| ())
    }

    pub fn run_with_input<IN, F>(&mut self, input: &IN, build: F) -> OrmResult<()>
    where
        IN: Entity,
        F: FnOnce(&QueryBuilder<'_, IN>) -> OrmResult<String>,
    {
        let query = self.with_input(input, build)?;
        self.engine.query_multi(&query).map(|_| ())
    }

    /// Run a select and decode its rows into `OUT`
    pub fn get<OUT, F>(&mut self, build: F) -> OrmResult<Vec<OUT>>
    where
        OUT: Entity,
        F: FnOnce(SqlBuilder<'_>) -> OrmResult<String>,
    {
        let query = Query::new(build(SqlBuilder::new(self.catalog))?);
        self.decode(&query)
    }

    pub fn get_with_input<OUT, IN, F>(&mut self, input: &IN, build: F) -> OrmResult<Vec<OUT>>
    where
        OUT: Entity,
        IN: Entity,
        F: FnOnce(&QueryBuilder<'_, IN>) -> OrmResult<String>,
    {
        let query = self.with_input(input, build)?;
        self.decode(&query)
    }

    /// Run statements returning one result set per entry of `outputs`
    pub fn get_many<F>(&mut self, outputs: &[EntityDescriptor], build: F) -> OrmResult<MultiResult<'a>>
    where
        F: FnOnce(SqlBuilder<'_>) -> OrmResult<String>,
    {
        let query = Query::new(build(SqlBuilder::new(self.catalog))?);
        let results = self.engine.query_multi(&query)?;
        MultiResult::new(self.catalog, outputs, results)
    }

    pub fn get_many_with_input<IN, F>(
        &mut self,
        outputs: &[EntityDescriptor],
        input: &IN,
        build: F,
    ) -> OrmResult<MultiResult<'a>>
    where
        IN: Entity,
        F: FnOnce(&QueryBuilder<'_, IN>) -> OrmResult<String>,
    {
        let query = self.with_input(input, build)?;
        let results = self.engine.query_multi(&query)?;
        MultiResult::new(self.catalog, outputs, results)
    }

    fn with_input<IN, F>(&self, input: &IN, build: F) -> OrmResult<Query>
    where
        IN: Entity,
        F: FnOnce(&QueryBuilder<'_, IN>) -> OrmResult<String>,
    {
        let builder = QueryBuilder::new(self.catalog, input)?;
        let sql = build(&builder)?;
        Ok(builder.build(sql))
    }

    fn decode<OUT: Entity>(&mut self, query: &Query) -> OrmResult<Vec<OUT>> {
        let binding = self.catalog.mapper().output::<OUT>()?;
        self.engine.query(query, |row| binding.decode(row))
    }
}

/// Result sets of a multi statement query, decoded in declaration order
#[derive(Debug)]
pub struct MultiResult<'a> {
    catalog: &'a Catalog,
    outputs: Vec<(TypeId, &'static str)>,
    results: vec::IntoIter<Vec<Row>>,
    read: usize,
}

impl<'a> MultiResult<'a> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        outputs: &[EntityDescriptor],
        results: Vec<Vec<Row>>,
    ) -> OrmResult<Self> {
        if results.len() != outputs.len() {
            return Err(QueryError::ResultCountMismatch {
                results: results.len(),
                outputs: outputs.len(),
            }
            .into());
        }
        Ok(Self {
            catalog,
            outputs: outputs.iter().map(|o| (o.type_id, o.name)).collect(),
            results: results.into_iter(),
            read: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }

    /// Decode the next result set, `T` must be the output declared for it
    pub fn next<T: Entity>(&mut self) -> OrmResult<Vec<T>> {
        let Some(&(type_id, name)) = self.outputs.get(self.read) else {
            return Err(QueryError::ResultsExhausted {
                read: self.read,
                total: self.outputs.len(),
            }
            .into());
        };
        if type_id != TypeId::of::<T>() {
            return Err(QueryError::ResultType {
                index: self.read,
                entity: name,
            }
            .into());
        }

        let rows = self.results.next().unwrap_or_default();
        self.read += 1;
        self.catalog.mapper().decode_many(rows)
    }
}
