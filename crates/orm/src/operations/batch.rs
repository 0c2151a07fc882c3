//! Batched statements
//!
//! One SQL template is executed for many parameter rows. Generated keys are
//! not read back.

use crate::catalog::Catalog;
use crate::engine::Engine;
use crate::error::OrmResult;
use crate::query::{BatchQuery, Query};
use crate::schema::Entity;

pub struct BatchQueries<'a> {
    catalog: &'a Catalog,
    engine: Engine<'a>,
}

impl<'a> BatchQueries<'a> {
    pub(crate) fn new(catalog: &'a Catalog, engine: Engine<'a>) -> Self {
        Self { catalog, engine }
    }

    /// Insert rows without a key, or every row when keys are caller assigned
    pub fn insert<T: Entity>(&mut self, rows: &[T]) -> OrmResult<u64> {
        let table = self.catalog.mapper().table::<T>()?;
        let mut queries = Vec::with_capacity(rows.len());
        for row in rows {
            if table.auto_increment() && table.primary_key_is_set(row)? {
                continue;
            }
            queries.push(self.catalog.insert_row(row, true)?);
        }
        self.run(queries)
    }

    /// Update rows that have a key
    pub fn update<T: Entity>(&mut self, rows: &[T]) -> OrmResult<u64> {
        let table = self.catalog.mapper().table::<T>()?;
        let mut queries = Vec::with_capacity(rows.len());
        for row in rows {
            if table.primary_key_is_set(row)? {
                queries.push(self.catalog.update_row(row)?);
            }
        }
        self.run(queries)
    }

    /// Delete rows that have a key and clear their auto-increment keys
    pub fn delete<T: Entity>(&mut self, rows: &mut [T]) -> OrmResult<u64> {
        let table = self.catalog.mapper().table::<T>()?;
        let mut queries = Vec::with_capacity(rows.len());
        let mut deleted = Vec::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if table.primary_key_is_set(row)? {
                queries.push(self.catalog.delete_row(row)?);
                deleted.push(i);
            }
        }

        let count = self.run(queries)?;
        for i in deleted {
            table.clear_primary_key(&mut rows[i])?;
        }
        Ok(count)
    }

    fn run(&mut self, queries: Vec<Query>) -> OrmResult<u64> {
        let Some(sql) = queries.first().map(|q| q.sql.clone()) else {
            return Ok(0);
        };
        let matrix = queries.into_iter().map(|q| q.values).collect();
        self.engine.batch(&BatchQuery::new(sql, matrix))
    }
}
