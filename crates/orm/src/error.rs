//! Error types for the ORM
//!
//! Errors are split by the layer that raises them so callers can tell a bad
//! schema apart from a bad query or an unavailable database.

use std::fmt;

use thiserror::Error;

use crate::backends::{DatabaseValue, DriverError};
use crate::connection::PoolError;
use crate::validation::Violation;

/// Result alias used throughout the crate
pub type OrmResult<T> = Result<T, OrmError>;

/// Top level error for every ORM operation
#[derive(Debug, Error)]
pub enum OrmError {
    /// Raised once at startup while resolving declarations
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// Raised once at startup by the validation harness
    #[error("Validation failed: {0}")]
    Validation(#[from] Violation),

    /// Turning rows into entities or entities into parameters failed
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// The caller asked for something the catalog or dialect cannot do
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    /// The driver failed while running a statement
    #[error("Driver error: {source}\n\tsql: {sql}\n\tparams: {params}")]
    Driver {
        sql: String,
        params: String,
        #[source]
        source: DriverError,
    },

    /// Acquiring a pooled connection failed
    #[error("Connection error: {0}")]
    Connection(#[from] PoolError),

    /// The body of a transaction failed and every change was rolled back
    #[error("Transaction was interrupted by an error, all changes were rolled back: {source}")]
    Transaction {
        #[source]
        source: Box<OrmError>,
    },

    /// Neither the driver nor the fallback query produced the inserted key
    #[error("Could not retrieve inserted id normally nor with fallback query: {sql}")]
    GeneratedKey {
        sql: String,
        /// Set when the fallback query itself failed
        #[source]
        source: Option<DriverError>,
    },
}

impl OrmError {
    /// Wrap a driver failure with the statement that caused it
    pub fn driver(sql: impl Into<String>, params: &[DatabaseValue], source: DriverError) -> Self {
        OrmError::Driver {
            sql: sql.into(),
            params: ParamList(params).to_string(),
            source,
        }
    }

    /// Wrap a driver failure of a statement without parameters
    pub fn command(sql: impl Into<String>, source: DriverError) -> Self {
        Self::driver(sql, &[], source)
    }

    /// Check whether the error came from the database driver
    pub fn is_driver_error(&self) -> bool {
        match self {
            OrmError::Driver { .. } => true,
            OrmError::Transaction { source } => source.is_driver_error(),
            _ => false,
        }
    }
}

struct ParamList<'a>(&'a [DatabaseValue]);

impl fmt::Display for ParamList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, "]")
    }
}

/// Errors raised by the metadata resolver
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Entity '{entity}' must have at least one field")]
    EmptyEntity { entity: &'static str },

    #[error("Field '{owner}.{field}' of type '{type_name}' has no registered serializer")]
    MissingSerializer {
        owner: String,
        field: &'static str,
        type_name: &'static str,
    },

    #[error("Field '{field}' does not exist on entity '{entity}'")]
    UnknownField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Foreign key '{owner}.{field}' references '{target}' which is not registered as a table")]
    DanglingForeignKey {
        owner: String,
        field: &'static str,
        target: &'static str,
    },

    #[error(
        "Primary key '{owner}.{field}' must be either mutable and optional (auto-increment integer) \
         or immutable and required (caller assigned), found mutable={mutable} nullable={nullable}"
    )]
    PrimaryKeyMutability {
        owner: String,
        field: &'static str,
        mutable: bool,
        nullable: bool,
    },

    #[error("Primary key '{owner}.{field}' is mutable and optional but of non integer type '{type_name}'")]
    NonIntegerAutoIncrement {
        owner: String,
        field: &'static str,
        type_name: &'static str,
    },
}

/// Errors raised while converting between entities and database values
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("Column '{field}' of '{entity}' is missing from the result set")]
    MissingColumn {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Column '{field}' of '{entity}' is NULL but the field is not optional")]
    UnexpectedNull {
        entity: &'static str,
        field: &'static str,
    },

    #[error("Could not decode {value} into '{type_name}'")]
    Decode {
        type_name: &'static str,
        value: String,
    },

    #[error("Serializer for '{expected}' received a value of another type")]
    Encode { expected: &'static str },

    #[error("Value {value} of '{type_name}' does not fit column type {db_type}")]
    OutOfRange {
        type_name: &'static str,
        db_type: String,
        value: String,
    },

    #[error("Field '{entity}.{field}' is not of type '{expected}'")]
    FieldType {
        entity: &'static str,
        field: &'static str,
        expected: &'static str,
    },

    #[error("Field '{field}' does not exist on '{entity}'")]
    UnknownField { entity: &'static str, field: String },

    #[error("Field '{entity}.{field}' is immutable")]
    ImmutableField { entity: &'static str, field: String },
}

/// Errors raised while building or running queries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("Type '{entity}' is not registered as a table")]
    UnregisteredTable { entity: &'static str },

    #[error("Type '{entity}' is not registered as an input")]
    UnregisteredInput { entity: &'static str },

    #[error("Type '{entity}' is not registered as an output")]
    UnregisteredOutput { entity: &'static str },

    #[error("Type '{entity}' is not registered as a procedure")]
    UnregisteredProcedure { entity: &'static str },

    #[error("Number of results '{results}' does not match with number of output types '{outputs}'")]
    ResultCountMismatch { results: usize, outputs: usize },

    #[error("No more results to read, {read} of {total} already taken")]
    ResultsExhausted { read: usize, total: usize },

    #[error("Result set {index} was not decoded as '{entity}'")]
    ResultType { index: usize, entity: &'static str },

    #[error("{feature} is not supported by {dialect}")]
    Unsupported {
        dialect: &'static str,
        feature: &'static str,
    },

    #[error("Invalid identifier '{identifier}'")]
    InvalidIdentifier { identifier: String },

    #[error("Primary key of '{entity}' is '{expected}', received '{found}'")]
    PrimaryKeyType {
        entity: &'static str,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Update of '{table}' changed {count} rows, expected at most one")]
    AmbiguousUpdate { table: String, count: u64 },

    #[error("Insert did not affect any row: {sql}")]
    NothingInserted { sql: String },

    #[error("Statement did not return a result set: {sql}")]
    MissingResult { sql: String },

    #[error("Savepoint '{name}' belongs to another transaction")]
    ForeignSavepoint { name: String },
}
