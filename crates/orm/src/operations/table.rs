use std::any::Any;

use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::OrmResult;
use crate::query::{Cursor, Page};
use crate::schema::Entity;

/// Statements acting on a whole table
pub struct TableQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> TableQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    pub fn create<T: Entity>(&mut self) -> OrmResult<u64> {
        let query = self.catalog.create_table::<T>()?;
        self.engine.update(&query)
    }

    pub fn drop<T: Entity>(&mut self) -> OrmResult<u64> {
        let query = self.catalog.drop_table::<T>(false)?;
        self.engine.update(&query)
    }

    pub fn drop_cascade<T: Entity>(&mut self) -> OrmResult<u64> {
        let query = self.catalog.drop_table::<T>(true)?;
        self.engine.update(&query)
    }

    /// Delete every row and return how many were removed
    pub fn delete<T: Entity>(&mut self) -> OrmResult<u64> {
        let query = self.catalog.delete_table::<T>()?;
        self.engine.update(&query)
    }

    pub fn select<T: Entity>(&mut self) -> OrmResult<Vec<T>> {
        let query = self.catalog.select_table::<T>()?;
        self.decode(&query)
    }

    /// Row with primary key `pk`, `K` must be the key's type
    pub fn select_by_pk<T: Entity, K: Any>(&mut self, pk: &K) -> OrmResult<Option<T>> {
        let query = self.catalog.select_by_pk::<T, K>(pk)?;
        Ok(self.decode(&query)?.into_iter().next())
    }

    pub fn select_page<T: Entity>(&mut self, page: &Page<T>) -> OrmResult<Vec<T>> {
        let query = self.catalog.select_page(page)?;
        self.decode(&query)
    }

    pub fn select_cursor<T: Entity, V: Any>(&mut self, cursor: &Cursor<T, V>) -> OrmResult<Vec<T>> {
        let query = self.catalog.select_cursor(cursor)?;
        self.decode(&query)
    }

    fn decode<T: Entity>(&mut self, query: &crate::query::Query) -> OrmResult<Vec<T>> {
        let binding = self.catalog.mapper().table::<T>()?.binding();
        self.engine.query(query, |row| binding.decode(row))
    }
}
