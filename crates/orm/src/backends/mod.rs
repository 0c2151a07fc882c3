//! Database Backend Abstractions
//!
//! This module provides the driver contract and dialect strategies that let
//! the same SQL generator and execution engine run against several databases.

pub mod core;
pub mod dialect;
pub mod sqlite;

// Re-export core traits and types
pub use core::*;
pub use dialect::{Escaper, SqlDialect};
pub use sqlite::{SqliteBackend, SqliteConnection};

/// Database backend type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatabaseBackendType {
    PostgreSQL,
    MySQL,
    SQLite,
}

impl std::fmt::Display for DatabaseBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseBackendType::PostgreSQL => write!(f, "postgresql"),
            DatabaseBackendType::MySQL => write!(f, "mysql"),
            DatabaseBackendType::SQLite => write!(f, "sqlite"),
        }
    }
}

impl DatabaseBackendType {
    /// Dialect spoken by this backend
    pub fn sql_dialect(&self) -> SqlDialect {
        match self {
            DatabaseBackendType::PostgreSQL => SqlDialect::PostgreSql,
            DatabaseBackendType::MySQL => SqlDialect::MySql,
            DatabaseBackendType::SQLite => SqlDialect::Sqlite,
        }
    }
}
