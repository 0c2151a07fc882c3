//! SQL dialect strategies
//!
//! The generator is shared by every backend; the few places where SQL text
//! differs between databases are answered here.

use std::fmt;

/// Identifier quoting convention
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Escaper {
    DoubleQuotes,
    Backticks,
}

impl Escaper {
    /// Quote one identifier, doubling any embedded closing quote
    pub fn wrap(&self, identifier: &str) -> String {
        match self {
            Escaper::DoubleQuotes => format!("\"{}\"", identifier.replace('"', "\"\"")),
            Escaper::Backticks => format!("`{}`", identifier.replace('`', "``")),
        }
    }

    /// Quote every part and join them with dots
    pub fn wrap_path(&self, parts: &[&str]) -> String {
        parts
            .iter()
            .map(|p| self.wrap(p))
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// SQL dialect differences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SqlDialect {
    Sqlite,
    PostgreSql,
    MySql,
}

impl SqlDialect {
    pub fn name(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SQLite",
            SqlDialect::PostgreSql => "PostgreSQL",
            SqlDialect::MySql => "MySQL",
        }
    }

    /// Get the identifier quote convention for this dialect
    pub fn escaper(&self) -> Escaper {
        match self {
            SqlDialect::Sqlite | SqlDialect::PostgreSql => Escaper::DoubleQuotes,
            SqlDialect::MySql => Escaper::Backticks,
        }
    }

    /// Get the parameter placeholder for the given 1-based position
    pub fn parameter_placeholder(&self, index: usize) -> String {
        match self {
            SqlDialect::PostgreSql => format!("${}", index),
            SqlDialect::MySql | SqlDialect::Sqlite => "?".to_string(),
        }
    }

    /// Query returning the key generated by the last insert
    pub fn last_insert_id_sql(&self) -> &'static str {
        match self {
            SqlDialect::Sqlite => "SELECT last_insert_rowid()",
            SqlDialect::PostgreSql => "SELECT lastval()",
            SqlDialect::MySql => "SELECT LAST_INSERT_ID()",
        }
    }

    /// Whether schemas can be created and dropped with SQL
    pub fn supports_schemas(&self) -> bool {
        !matches!(self, SqlDialect::Sqlite)
    }

    pub fn supports_procedures(&self) -> bool {
        !matches!(self, SqlDialect::Sqlite)
    }

    /// Whether a foreign key may reference a schema qualified table
    pub fn qualified_references(&self) -> bool {
        !matches!(self, SqlDialect::Sqlite)
    }

    /// Column definition of an auto-increment primary key
    pub fn auto_increment_primary_key(&self, column: &str, db_type: &str) -> String {
        match self {
            SqlDialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", column),
            SqlDialect::PostgreSql => {
                let serial = if db_type.eq_ignore_ascii_case("BIGINT") {
                    "BIGSERIAL"
                } else {
                    "SERIAL"
                };
                format!("{} {} PRIMARY KEY", column, serial)
            }
            SqlDialect::MySql => format!("{} {} AUTO_INCREMENT PRIMARY KEY", column, db_type),
        }
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
