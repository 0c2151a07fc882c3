//! Single row statements keyed by the primary key
//!
//! These are not batches: every row is its own statement, and inserts write
//! the generated key back onto the row.

use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::{OrmResult, QueryError};
use crate::mapper::TableInfo;
use crate::schema::Entity;

pub struct RowQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> RowQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    /// Insert a row
    ///
    /// Returns `false` without touching the database when an auto-increment
    /// key is already set. Otherwise the generated key is written back.
    pub fn insert<T: Entity>(&mut self, row: &mut T) -> OrmResult<bool> {
        let table = self.catalog.mapper().table::<T>()?;
        if table.auto_increment() && table.primary_key_is_set(row)? {
            return Ok(false);
        }

        let query = self.catalog.insert_row(row, false)?;
        if !table.auto_increment() {
            return Ok(self.engine.update(&query)? == 1);
        }

        let last_id_sql = self.catalog.dialect().last_insert_id_sql();
        let key = self.engine.insert(&query, last_id_sql)?;
        table.set_primary_key(row, &key)?;
        Ok(true)
    }

    /// Update every column of a row, `false` when it has no key or no row matched
    pub fn update<T: Entity>(&mut self, row: &T) -> OrmResult<bool> {
        let table = self.catalog.mapper().table::<T>()?;
        if !table.primary_key_is_set(row)? {
            return Ok(false);
        }
        let query = self.catalog.update_row(row)?;
        let count = self.engine.update(&query)?;
        single_row(table, count)
    }

    /// Delete a row and clear its auto-increment key
    pub fn delete<T: Entity>(&mut self, row: &mut T) -> OrmResult<bool> {
        let table = self.catalog.mapper().table::<T>()?;
        if !table.primary_key_is_set(row)? {
            return Ok(false);
        }
        let query = self.catalog.delete_row(row)?;
        let count = self.engine.update(&query)?;
        let deleted = single_row(table, count)?;
        if deleted {
            table.clear_primary_key(row)?;
        }
        Ok(deleted)
    }

    pub fn insert_many<T: Entity>(&mut self, rows: &mut [T]) -> OrmResult<Vec<bool>> {
        rows.iter_mut().map(|row| self.insert(row)).collect()
    }

    pub fn update_many<T: Entity>(&mut self, rows: &[T]) -> OrmResult<Vec<bool>> {
        rows.iter().map(|row| self.update(row)).collect()
    }

    pub fn delete_many<T: Entity>(&mut self, rows: &mut [T]) -> OrmResult<Vec<bool>> {
        rows.iter_mut().map(|row| self.delete(row)).collect()
    }
}

fn single_row(table: &TableInfo, count: u64) -> OrmResult<bool> {
    match count {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(QueryError::AmbiguousUpdate {
            table: table.path(),
            count,
        }
        .into()),
    }
}
