//! # tabula-orm: typed relational mapping over pooled connections
//!
//! Domain types derive [`Entity`] and are declared into [`Schema`]s. A
//! [`Catalog`] resolves and validates the declarations once at startup;
//! a [`Service`] then runs scoped `autocommit`, `read_only` and
//! `transaction` blocks against a connection pool.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tabula_orm::{Catalog, CatalogConfig, DatabasePoolConfig, Entity, Schema, Service, SqlDialect, Table};
//!
//! #[derive(Debug, Entity)]
//! struct Author {
//!     #[entity(mutable)]
//!     id: Option<i32>,
//!     name: String,
//! }
//!
//! # fn main() -> tabula_orm::OrmResult<()> {
//! let schema = Schema::new("main").table(Table::new(Author::ID));
//! let config = CatalogConfig::new(SqlDialect::Sqlite)
//!     .serializers(tabula_orm::serializers::basic::all())
//!     .schema(schema);
//! let catalog = Catalog::new(config)?;
//! let service = Service::connect(Arc::new(catalog), DatabasePoolConfig::new("sqlite://app.db"))?;
//!
//! service.transaction(|tx| {
//!     tx.table().create::<Author>()?;
//!     let mut author = Author { id: None, name: "Ursula".into() };
//!     tx.row().insert(&mut author)?;
//!     Ok(author.id)
//! })?;
//! # Ok(())
//! # }
//! ```

extern crate self as tabula_orm;

pub mod backends;
pub mod catalog;
pub mod connection;
pub mod engine;
pub mod error;
pub mod export;
pub mod mapper;
pub mod operations;
pub mod profiler;
pub mod query;
pub mod schema;
pub mod security;
pub mod serializers;
pub mod service;
pub mod transactions;
pub mod validation;

pub use backends::{DatabaseConnection, DatabaseValue, Row, SqlDialect, WireType};
pub use catalog::{Catalog, CatalogConfig};
pub use connection::{ConnectionPool, DatabasePoolConfig, PoolError};
pub use error::{ConfigError, MappingError, OrmError, OrmResult, QueryError};
pub use export::Exporter;
pub use operations::{MultiResult, QueryConnection, TransactionConnection};
pub use profiler::{Profiler, QueryKind, QueryLog};
pub use query::{Cursor, Order, Page, Query, QueryBuilder, QueryValue, SqlBuilder};
pub use schema::{Constraint, Entity, EntityDescriptor, Field, Procedure, Schema, Table};
pub use serializers::TypeSerializer;
pub use service::Service;
pub use transactions::{IsolationLevel, Savepoint, TransactionConfig};
pub use validation::Violation;

pub use tabula_orm_derive::Entity;
