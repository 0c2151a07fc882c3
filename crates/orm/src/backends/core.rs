//! Core Database Backend Traits
//!
//! This module defines the driver contract the execution engine talks to,
//! the value type used for parameter binding and result rows, and the
//! backend factory used by the connection pool.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::connection::DatabasePoolConfig;
use crate::transactions::IsolationLevel;

use super::{DatabaseBackendType, SqlDialect};

/// Result alias for driver operations
pub type DriverResult<T> = Result<T, DriverError>;

/// Error reported by a database driver
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("{feature} is not supported by the driver")]
    Unsupported { feature: &'static str },

    #[error("{message}")]
    Failed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DriverError {
    pub fn failed(message: impl Into<String>) -> Self {
        DriverError::Failed {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source<E>(message: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        DriverError::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn unsupported(feature: &'static str) -> Self {
        DriverError::Unsupported { feature }
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, DriverError::Unsupported { .. })
    }
}

/// Type tag telling the driver how a bound value is represented on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Char,
    VarChar,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Binary,
    Json,
}

impl WireType {
    /// Whole number types, the only ones allowed for auto-increment keys
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            WireType::TinyInt | WireType::SmallInt | WireType::Integer | WireType::BigInt
        )
    }
}

/// Database value enumeration for type-safe parameter binding
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    DateTime(chrono::DateTime<chrono::Utc>),
    NaiveDateTime(chrono::NaiveDateTime),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    Json(JsonValue),
}

impl DatabaseValue {
    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, DatabaseValue::Null)
    }

    /// Whole number view, accepting any integer width
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DatabaseValue::Int32(i) => Some(*i as i64),
            DatabaseValue::Int64(i) => Some(*i),
            DatabaseValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Floating point view, accepting integers as well
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DatabaseValue::Float32(f) => Some(*f as f64),
            DatabaseValue::Float64(f) => Some(*f),
            DatabaseValue::Int32(i) => Some(*i as f64),
            DatabaseValue::Int64(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DatabaseValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DatabaseValue::Bool(b) => Some(*b),
            DatabaseValue::Int32(i) => Some(*i != 0),
            DatabaseValue::Int64(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl fmt::Display for DatabaseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseValue::Null => write!(f, "NULL"),
            DatabaseValue::Bool(b) => write!(f, "{}", b),
            DatabaseValue::Int32(i) => write!(f, "{}", i),
            DatabaseValue::Int64(i) => write!(f, "{}", i),
            DatabaseValue::Float32(v) => write!(f, "{}", v),
            DatabaseValue::Float64(v) => write!(f, "{}", v),
            DatabaseValue::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            DatabaseValue::Bytes(b) => write!(f, "x'{}'", hex::encode(b)),
            DatabaseValue::Uuid(u) => write!(f, "'{}'", u),
            DatabaseValue::DateTime(dt) => write!(f, "'{}'", dt.to_rfc3339()),
            DatabaseValue::NaiveDateTime(dt) => write!(f, "'{}'", dt),
            DatabaseValue::Date(d) => write!(f, "'{}'", d),
            DatabaseValue::Time(t) => write!(f, "'{}'", t),
            DatabaseValue::Json(j) => write!(f, "'{}'", j),
        }
    }
}

impl From<bool> for DatabaseValue {
    fn from(value: bool) -> Self {
        DatabaseValue::Bool(value)
    }
}

impl From<i32> for DatabaseValue {
    fn from(value: i32) -> Self {
        DatabaseValue::Int32(value)
    }
}

impl From<i64> for DatabaseValue {
    fn from(value: i64) -> Self {
        DatabaseValue::Int64(value)
    }
}

impl From<f64> for DatabaseValue {
    fn from(value: f64) -> Self {
        DatabaseValue::Float64(value)
    }
}

impl From<String> for DatabaseValue {
    fn from(value: String) -> Self {
        DatabaseValue::String(value)
    }
}

impl From<&str> for DatabaseValue {
    fn from(value: &str) -> Self {
        DatabaseValue::String(value.to_string())
    }
}

impl<T> From<Option<T>> for DatabaseValue
where
    T: Into<DatabaseValue>,
{
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => DatabaseValue::Null,
        }
    }
}

/// One row of a result set, columns addressed by position or name
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<DatabaseValue>,
}

impl Row {
    pub fn new(columns: Arc<[String]>, values: Vec<DatabaseValue>) -> Self {
        Self { columns, values }
    }

    /// Get a column value by index
    pub fn get_by_index(&self, index: usize) -> Option<&DatabaseValue> {
        self.values.get(index)
    }

    /// Get a column value by name, case sensitive first then case insensitive
    pub fn get_by_name(&self, name: &str) -> Option<&DatabaseValue> {
        self.position(name).and_then(|i| self.values.get(i))
    }

    /// Move a column value out of the row, leaving NULL behind
    pub fn take_by_name(&mut self, name: &str) -> Option<DatabaseValue> {
        let index = self.position(name)?;
        self.values
            .get_mut(index)
            .map(|v| std::mem::replace(v, DatabaseValue::Null))
    }

    pub fn column_count(&self) -> usize {
        self.values.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .or_else(|| self.columns.iter().position(|c| c.eq_ignore_ascii_case(name)))
    }
}

/// Synchronous database connection contract
///
/// Parameters are bound positionally in the order they are given. All
/// transaction state is local to the connection.
pub trait DatabaseConnection: Send {
    /// Dialect the connection speaks
    fn dialect(&self) -> SqlDialect;

    /// Execute a statement and return affected rows count
    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<u64>;

    /// Execute a statement and return the result rows
    fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Row>>;

    /// Execute a script that may produce several result sets
    ///
    /// Statements without a result set contribute nothing to the output.
    fn query_multi(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Vec<Row>>>;

    /// Execute one statement once per parameter row and return the sum of affected rows
    fn execute_batch(&mut self, sql: &str, rows: &[Vec<DatabaseValue>]) -> DriverResult<u64> {
        let mut total = 0;
        for params in rows {
            total += self.execute(sql, params)?;
        }
        Ok(total)
    }

    /// Key generated by the last insert on this connection
    fn generated_key(&mut self) -> DriverResult<Option<DatabaseValue>> {
        Err(DriverError::unsupported("generated keys"))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()>;

    fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    fn rollback(&mut self) -> DriverResult<()>;

    fn set_savepoint(&mut self, name: &str) -> DriverResult<()>;

    fn rollback_to_savepoint(&mut self, name: &str) -> DriverResult<()>;

    fn release_savepoint(&mut self, name: &str) -> DriverResult<()>;

    /// Cheap liveness check used before handing a pooled connection out
    fn is_valid(&mut self) -> bool;
}

/// Factory for connections of one database backend
pub trait DatabaseBackend: Send + Sync {
    /// Open a new connection
    fn connect(&self, config: &DatabasePoolConfig) -> DriverResult<Box<dyn DatabaseConnection>>;

    /// Get the SQL dialect used by this backend
    fn sql_dialect(&self) -> SqlDialect;

    /// Get the backend type
    fn backend_type(&self) -> DatabaseBackendType;

    /// Most connections the configured database can be shared over
    fn connection_limit(&self, _config: &DatabasePoolConfig) -> Option<u32> {
        None
    }
}

/// Database backend registry for managing multiple backend implementations
pub struct DatabaseBackendRegistry {
    backends: HashMap<DatabaseBackendType, Arc<dyn DatabaseBackend>>,
}

impl DatabaseBackendRegistry {
    /// Create a new backend registry
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Registry with every backend shipped in this crate
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(DatabaseBackendType::SQLite, Arc::new(super::SqliteBackend));
        registry
    }

    /// Register a database backend
    pub fn register(&mut self, backend_type: DatabaseBackendType, backend: Arc<dyn DatabaseBackend>) {
        self.backends.insert(backend_type, backend);
    }

    /// Get a database backend by type
    pub fn get(&self, backend_type: &DatabaseBackendType) -> Option<Arc<dyn DatabaseBackend>> {
        self.backends.get(backend_type).cloned()
    }

    /// Find the backend serving the given URL
    pub fn for_url(&self, url: &str) -> DriverResult<Arc<dyn DatabaseBackend>> {
        let backend_type = Self::detect_backend_from_url(url)?;
        self.get(&backend_type)
            .ok_or_else(|| DriverError::failed(format!("No backend registered for {}", backend_type)))
    }

    /// Detect database backend type from URL
    pub fn detect_backend_from_url(url: &str) -> DriverResult<DatabaseBackendType> {
        if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(DatabaseBackendType::PostgreSQL)
        } else if url.starts_with("mysql://") {
            Ok(DatabaseBackendType::MySQL)
        } else if url.starts_with("sqlite:") || url.starts_with("file:") {
            Ok(DatabaseBackendType::SQLite)
        } else {
            Err(DriverError::failed(format!(
                "Unable to detect database backend from URL: {}",
                url
            )))
        }
    }
}

impl Default for DatabaseBackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
