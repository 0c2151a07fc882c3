//! Query Builder / SQL Generator

pub mod builder;
pub mod pagination;
pub mod sql_generation;
pub mod types;

pub use builder::{QueryBuilder, SqlBuilder};
pub use pagination::{Cursor, Order, Page, DEFAULT_LIMIT};
pub use types::{BatchQuery, Query, QueryValue, BATCH_CHUNK_SIZE};
