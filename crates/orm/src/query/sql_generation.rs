//! SQL generation
//!
//! Every statement the crate runs on its own is produced here. Identifiers
//! come from validated metadata and are escaped by the dialect; every value
//! that originates from the caller is bound as a placeholder.

use std::any::{type_name, Any, TypeId};

use crate::backends::{DatabaseValue, SqlDialect, WireType};
use crate::catalog::Catalog;
use crate::error::{OrmResult, QueryError};
use crate::mapper::{Column, TableInfo};
use crate::schema::entity::short_name;
use crate::schema::Entity;
use crate::security::validate_identifier;

use super::pagination::{Cursor, Page};
use super::types::{Placeholders, Query, QueryValue};

impl Catalog {
    fn unsupported(&self, feature: &'static str) -> QueryError {
        QueryError::Unsupported {
            dialect: self.dialect().name(),
            feature,
        }
    }

    fn placeholders(&self) -> Placeholders {
        Placeholders::new(self.dialect())
    }

    fn escaped(&self, name: &str) -> String {
        self.escaper().wrap(name)
    }

    pub fn create_schema(&self, schema: &str) -> OrmResult<Query> {
        validate_identifier(schema)?;
        if !self.dialect().supports_schemas() {
            return Err(self.unsupported("CREATE SCHEMA").into());
        }
        Ok(Query::new(format!("CREATE SCHEMA IF NOT EXISTS {}", self.escaped(schema))))
    }

    pub fn drop_schema(&self, schema: &str, cascade: bool) -> OrmResult<Query> {
        validate_identifier(schema)?;
        if !self.dialect().supports_schemas() {
            return Err(self.unsupported("DROP SCHEMA").into());
        }
        // MySQL drops the contained tables anyway and rejects the keyword
        let cascade = if cascade && self.dialect() == SqlDialect::PostgreSql {
            " CASCADE"
        } else {
            ""
        };
        Ok(Query::new(format!(
            "DROP SCHEMA IF EXISTS {}{}",
            self.escaped(schema),
            cascade
        )))
    }

    pub fn create_table<T: Entity>(&self) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let mut definitions = Vec::with_capacity(table.columns().len());
        let mut constraints = Vec::new();

        let pk = table.primary_key();
        let pk_name = self.escaped(pk.name());
        if table.auto_increment() {
            definitions.push(self.dialect().auto_increment_primary_key(&pk_name, pk.db_type()));
        } else {
            definitions.push(format!("{} {} PRIMARY KEY", pk_name, pk.db_type()));
        }

        for column in table.columns().iter().filter(|c| !c.is_primary()) {
            definitions.push(self.column_definition(column));
            if let Some(target) = column.foreign_table().and_then(|id| self.mapper().table_by_id(id)) {
                constraints.push(self.foreign_key_clause(column, target));
            }
        }

        definitions.extend(constraints);
        Ok(Query::new(format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            table.path(),
            definitions.join(", ")
        )))
    }

    fn column_definition(&self, column: &Column) -> String {
        let mut definition = format!("{} {}", self.escaped(column.name()), column.db_type());
        if column.not_null() {
            definition.push_str(" NOT NULL");
        }
        if column.unique() {
            definition.push_str(" UNIQUE");
        }
        definition
    }

    fn foreign_key_clause(&self, column: &Column, target: &TableInfo) -> String {
        let reference = if self.dialect().qualified_references() {
            target.path()
        } else {
            self.escaped(target.name())
        };
        let mut clause = format!(
            "FOREIGN KEY ({}) REFERENCES {} ({})",
            self.escaped(column.name()),
            reference,
            self.escaped(target.primary_key().name())
        );
        if column.cascade_update() {
            clause.push_str(" ON UPDATE CASCADE");
        }
        if column.cascade_delete() {
            clause.push_str(" ON DELETE CASCADE");
        }
        clause
    }

    pub fn drop_table<T: Entity>(&self, cascade: bool) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let cascade = if cascade && self.dialect() != SqlDialect::Sqlite {
            " CASCADE"
        } else {
            ""
        };
        Ok(Query::new(format!("DROP TABLE IF EXISTS {}{}", table.path(), cascade)))
    }

    /// Delete every row of a table
    pub fn delete_table<T: Entity>(&self) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        Ok(Query::new(format!("DELETE FROM {}", table.path())))
    }

    /// Insert one row, the auto-increment key is left to the database
    ///
    /// Outside of batches PostgreSQL returns the generated key with
    /// `RETURNING`.
    pub fn insert_row<T: Entity>(&self, row: &T, batch: bool) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let mut columns = Vec::new();
        let mut values = Vec::new();
        for column in table.insert_columns() {
            columns.push(self.escaped(column.name()));
            values.push(column.bound.query_value(table.name(), row)?);
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table.path(),
            columns.join(", "),
            self.placeholders().list(values.len())
        );
        if !batch && table.auto_increment() && self.dialect() == SqlDialect::PostgreSql {
            sql.push_str(&format!(" RETURNING {}", self.escaped(table.primary_key().name())));
        }
        Ok(Query::with_values(sql, values))
    }

    /// Update every column of a row identified by its primary key
    pub fn update_row<T: Entity>(&self, row: &T) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let mut placeholders = self.placeholders();
        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for column in table.update_columns() {
            assignments.push(format!("{} = {}", self.escaped(column.name()), placeholders.next()));
            values.push(column.bound.query_value(table.name(), row)?);
        }
        values.push(table.primary_key_value(row)?);

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            table.path(),
            assignments.join(", "),
            self.escaped(table.primary_key().name()),
            placeholders.next()
        );
        Ok(Query::with_values(sql, values))
    }

    pub fn delete_row<T: Entity>(&self, row: &T) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            table.path(),
            self.escaped(table.primary_key().name()),
            self.placeholders().next()
        );
        Ok(Query::with_values(sql, vec![table.primary_key_value(row)?]))
    }

    pub fn select_table<T: Entity>(&self) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        Ok(Query::new(format!("SELECT * FROM {}", table.path())))
    }

    /// Select the row with the given primary key, `K` must be the key type
    pub fn select_by_pk<T: Entity, K: Any>(&self, pk: &K) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let column = table.primary_key();
        if column.field().type_id != TypeId::of::<K>() {
            return Err(QueryError::PrimaryKeyType {
                entity: table.name(),
                expected: column.field().type_name,
                found: short_name(type_name::<K>()),
            }
            .into());
        }

        let value = QueryValue::new(column.name(), column.bound.wire_type(), column.serializer().encode(pk)?);
        let sql = format!(
            "SELECT * FROM {} WHERE {} = {}",
            table.path(),
            self.escaped(column.name()),
            self.placeholders().next()
        );
        Ok(Query::with_values(sql, vec![value]))
    }

    /// `ORDER BY col LIMIT ? OFFSET ?` with `offset = number * limit`
    pub fn select_page<T: Entity>(&self, page: &Page<T>) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let column = self.order_column(table, page.order_by)?;
        let mut placeholders = self.placeholders();
        let sql = format!(
            "SELECT * FROM {} ORDER BY {} {} LIMIT {} OFFSET {}",
            table.path(),
            self.escaped(column.name()),
            page.order,
            placeholders.next(),
            placeholders.next()
        );
        Ok(Query::with_values(
            sql,
            vec![count_value("limit", page.limit), count_value("offset", page.offset())],
        ))
    }

    /// Rows at or past the cursor index in cursor order
    pub fn select_cursor<T: Entity, V: Any>(&self, cursor: &Cursor<T, V>) -> OrmResult<Query> {
        let table = self.mapper().table::<T>()?;
        let column = self.order_column(table, cursor.order_by.name())?;
        let index = QueryValue::new(
            column.name(),
            column.bound.wire_type(),
            column.serializer().encode(&cursor.index)?,
        );

        let mut placeholders = self.placeholders();
        let name = self.escaped(column.name());
        let sql = format!(
            "SELECT * FROM {} WHERE {} {} {} ORDER BY {} {} LIMIT {}",
            table.path(),
            name,
            cursor.comparison(),
            placeholders.next(),
            name,
            cursor.order,
            placeholders.next()
        );
        Ok(Query::with_values(sql, vec![index, count_value("limit", cursor.limit)]))
    }

    fn order_column<'t>(&self, table: &'t TableInfo, name: &str) -> OrmResult<&'t Column> {
        table.column(name).ok_or_else(|| {
            QueryError::InvalidIdentifier {
                identifier: format!("{}.{}", table.name(), name),
            }
            .into()
        })
    }

    pub fn create_procedure<P: Entity>(&self, body: &str) -> OrmResult<Query> {
        let procedure = self.mapper().procedure::<P>()?;
        let sql = match self.dialect() {
            SqlDialect::Sqlite => return Err(self.unsupported("Stored procedures").into()),
            SqlDialect::PostgreSql => {
                let arguments = procedure
                    .arguments()
                    .iter()
                    .map(|a| format!("{} {}", self.escaped(a.name()), a.db_type()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE OR REPLACE PROCEDURE {}({})\nLANGUAGE plpgsql\nAS $$\nBEGIN\n{}\nEND;\n$$",
                    procedure.path(),
                    arguments,
                    body
                )
            }
            SqlDialect::MySql => {
                let arguments = procedure
                    .arguments()
                    .iter()
                    .map(|a| format!("IN {} {}", self.escaped(a.name()), a.db_type()))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "CREATE PROCEDURE {}({})\nBEGIN\n{}\nEND",
                    procedure.path(),
                    arguments,
                    body
                )
            }
        };
        Ok(Query::new(sql))
    }

    pub fn drop_procedure<P: Entity>(&self) -> OrmResult<Query> {
        let procedure = self.mapper().procedure::<P>()?;
        if !self.dialect().supports_procedures() {
            return Err(self.unsupported("Stored procedures").into());
        }
        Ok(Query::new(format!("DROP PROCEDURE IF EXISTS {}", procedure.path())))
    }

    /// `CALL procedure(?, ...)` with the fields of `procedure` as arguments
    pub fn call_procedure<P: Entity>(&self, procedure: &P) -> OrmResult<Query> {
        let info = self.mapper().procedure::<P>()?;
        if !self.dialect().supports_procedures() {
            return Err(self.unsupported("Stored procedures").into());
        }
        let values = info.binding().query_values(procedure)?;
        let sql = format!(
            "CALL {}({})",
            info.path(),
            self.placeholders().list(values.len())
        );
        Ok(Query::with_values(sql, values))
    }
}

fn count_value(name: &'static str, count: u64) -> QueryValue {
    let value = i64::try_from(count).unwrap_or(i64::MAX);
    QueryValue::new(name, WireType::BigInt, DatabaseValue::Int64(value))
}
