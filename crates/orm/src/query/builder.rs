//! Builders for hand-written SQL
//!
//! [`SqlBuilder`] hands out escaped identifiers taken from the catalog.
//! [`QueryBuilder`] adds [`QueryBuilder::input`], which binds a field of a
//! registered input value and returns its placeholder.

use std::any::Any;
use std::cell::RefCell;
use std::ops::Deref;

use crate::catalog::Catalog;
use crate::error::{MappingError, OrmResult};
use crate::mapper::EntityBinding;
use crate::schema::{Entity, Field};

use super::types::{Placeholders, Query, QueryValue};

/// Escaped identifiers for hand-written SQL
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder<'c> {
    catalog: &'c Catalog,
}

impl<'c> SqlBuilder<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }

    /// `SELECT * FROM` the table of `T`
    pub fn select<T: Entity>(&self) -> OrmResult<String> {
        Ok(format!("SELECT * FROM {}", self.table::<T>()?))
    }

    /// `DELETE FROM` the table of `T`
    pub fn delete<T: Entity>(&self) -> OrmResult<String> {
        Ok(format!("DELETE FROM {}", self.table::<T>()?))
    }

    /// Escaped `schema.table` path of `T`
    pub fn table<T: Entity>(&self) -> OrmResult<String> {
        Ok(self.catalog.mapper().table::<T>()?.path())
    }

    /// Escaped `schema.table.column` path of a table field
    pub fn column<T: Entity, V>(&self, field: Field<T, V>) -> OrmResult<String> {
        let table = self.catalog.mapper().table::<T>()?;
        match table.column(field.name()) {
            Some(column) => Ok(table.column_path(column.name())),
            None => Err(MappingError::UnknownField {
                entity: table.name(),
                field: field.name().to_string(),
            }
            .into()),
        }
    }

    /// Escaped bare field name
    pub fn name<T, V>(&self, field: Field<T, V>) -> String {
        self.catalog.escaper().wrap(field.name())
    }

    /// Escaped `schema.procedure` path of `P`
    pub fn procedure<P: Entity>(&self) -> OrmResult<String> {
        Ok(self.catalog.mapper().procedure::<P>()?.path())
    }
}

/// Hand-written SQL with parameters read from an input value
pub struct QueryBuilder<'c, IN> {
    sql: SqlBuilder<'c>,
    input: &'c IN,
    binding: &'c EntityBinding,
    placeholders: RefCell<Placeholders>,
    values: RefCell<Vec<QueryValue>>,
}

impl<'c, IN: Entity> QueryBuilder<'c, IN> {
    /// Fails when `IN` is not a registered input
    pub fn new(catalog: &'c Catalog, input: &'c IN) -> OrmResult<Self> {
        Ok(Self {
            sql: SqlBuilder::new(catalog),
            input,
            binding: catalog.mapper().input::<IN>()?,
            placeholders: RefCell::new(Placeholders::new(catalog.dialect())),
            values: RefCell::new(Vec::new()),
        })
    }

    /// Bind a field of the input and return its placeholder
    pub fn input<V: Any>(&self, field: Field<IN, V>) -> OrmResult<String> {
        let bound = self.binding.field(field.name()).ok_or_else(|| MappingError::UnknownField {
            entity: self.binding.name(),
            field: field.name().to_string(),
        })?;
        let value = bound.query_value(self.binding.name(), self.input)?;
        self.values.borrow_mut().push(value);
        Ok(self.placeholders.borrow_mut().next())
    }

    /// Finish with the SQL written by the caller
    pub fn build(self, sql: impl Into<String>) -> Query {
        Query::with_values(sql, self.values.into_inner())
    }
}

impl<'c, IN> Deref for QueryBuilder<'c, IN> {
    type Target = SqlBuilder<'c>;

    fn deref(&self) -> &Self::Target {
        &self.sql
    }
}
