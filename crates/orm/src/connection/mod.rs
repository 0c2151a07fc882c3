//! Connection Management

pub mod pool;

pub use pool::{ConnectionPool, DatabasePoolConfig, PoolError, PoolStats, PooledConnection};
