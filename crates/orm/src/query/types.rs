//! Query types: SQL text with its ordered, already encoded parameters

use std::fmt;

use crate::backends::{DatabaseValue, SqlDialect, WireType};

/// Rows sent to the driver per batch round trip
pub const BATCH_CHUNK_SIZE: usize = 1000;

/// One bound parameter
#[derive(Debug, Clone, PartialEq)]
pub struct QueryValue {
    pub name: &'static str,
    pub wire_type: WireType,
    pub value: DatabaseValue,
}

impl QueryValue {
    pub fn new(name: &'static str, wire_type: WireType, value: DatabaseValue) -> Self {
        Self { name, wire_type, value }
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// Parameterized SQL statement
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub sql: String,
    pub values: Vec<QueryValue>,
}

impl Query {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            values: Vec::new(),
        }
    }

    pub fn with_values(sql: impl Into<String>, values: Vec<QueryValue>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    /// Raw parameters in binding order
    pub fn params(&self) -> Vec<DatabaseValue> {
        self.values.iter().map(|v| v.value.clone()).collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql)?;
        if !self.values.is_empty() {
            write!(f, " [")?;
            for (i, value) in self.values.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", value)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

/// One statement executed once per row of parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BatchQuery {
    pub sql: String,
    pub value_matrix: Vec<Vec<QueryValue>>,
}

impl BatchQuery {
    pub fn new(sql: impl Into<String>, value_matrix: Vec<Vec<QueryValue>>) -> Self {
        Self {
            sql: sql.into(),
            value_matrix,
        }
    }

    pub fn len(&self) -> usize {
        self.value_matrix.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value_matrix.is_empty()
    }

    /// Raw parameter rows grouped in chunks of [`BATCH_CHUNK_SIZE`]
    pub fn chunks(&self) -> impl Iterator<Item = Vec<Vec<DatabaseValue>>> + '_ {
        self.value_matrix.chunks(BATCH_CHUNK_SIZE).map(|chunk| {
            chunk
                .iter()
                .map(|row| row.iter().map(|v| v.value.clone()).collect())
                .collect()
        })
    }
}

/// Hands out positional placeholders in the style of a dialect
#[derive(Debug, Clone)]
pub(crate) struct Placeholders {
    dialect: SqlDialect,
    count: usize,
}

impl Placeholders {
    pub(crate) fn new(dialect: SqlDialect) -> Self {
        Self { dialect, count: 0 }
    }

    pub(crate) fn next(&mut self) -> String {
        self.count += 1;
        self.dialect.parameter_placeholder(self.count)
    }

    /// `n` placeholders joined with commas
    pub(crate) fn list(&mut self, n: usize) -> String {
        (0..n).map(|_| self.next()).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_chunks() {
        let row = vec![QueryValue::new("value", WireType::Integer, DatabaseValue::Int32(1))];
        let batch = BatchQuery::new("INSERT", vec![row; 2345]);
        let sizes: Vec<usize> = batch.chunks().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![1000, 1000, 345]);
    }

    #[test]
    fn test_placeholders_follow_dialect() {
        let mut pg = Placeholders::new(SqlDialect::PostgreSql);
        assert_eq!(pg.list(3), "$1, $2, $3");
        assert_eq!(pg.next(), "$4");

        let mut sqlite = Placeholders::new(SqlDialect::Sqlite);
        assert_eq!(sqlite.list(2), "?, ?");
    }

    #[test]
    fn test_query_display_lists_values() {
        let query = Query::with_values(
            "SELECT * FROM \"t\" WHERE \"pk\" = ?",
            vec![QueryValue::new("pk", WireType::Integer, DatabaseValue::Int32(4))],
        );
        assert_eq!(query.to_string(), "SELECT * FROM \"t\" WHERE \"pk\" = ? [pk = 4]");
    }
}
