//! Transaction Isolation Levels

use crate::backends::SqlDialect;

/// Standard SQL isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Keyword used by `SET TRANSACTION ISOLATION LEVEL`
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }

    /// Level a fresh connection of the dialect runs at
    pub fn default_for_dialect(dialect: SqlDialect) -> Self {
        match dialect {
            SqlDialect::PostgreSql => IsolationLevel::ReadCommitted,
            SqlDialect::MySql => IsolationLevel::RepeatableRead,
            SqlDialect::Sqlite => IsolationLevel::Serializable,
        }
    }

    pub fn is_supported_by(&self, dialect: SqlDialect) -> bool {
        match dialect {
            SqlDialect::PostgreSql | SqlDialect::MySql => true,
            // shared cache only distinguishes dirty reads
            SqlDialect::Sqlite => matches!(
                self,
                IsolationLevel::ReadUncommitted | IsolationLevel::Serializable
            ),
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_support() {
        assert!(IsolationLevel::Serializable.is_supported_by(SqlDialect::Sqlite));
        assert!(IsolationLevel::ReadUncommitted.is_supported_by(SqlDialect::Sqlite));
        assert!(!IsolationLevel::ReadCommitted.is_supported_by(SqlDialect::Sqlite));
        assert!(IsolationLevel::RepeatableRead.is_supported_by(SqlDialect::MySql));
    }

    #[test]
    fn test_dialect_defaults() {
        assert_eq!(
            IsolationLevel::default_for_dialect(SqlDialect::PostgreSql).as_sql(),
            "READ COMMITTED"
        );
        assert_eq!(IsolationLevel::default_for_dialect(SqlDialect::Sqlite), IsolationLevel::Serializable);
    }
}
