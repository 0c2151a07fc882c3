//! Connection Pool Management
//!
//! A bounded, blocking pool of driver connections. A connection is checked
//! out by exactly one caller at a time and comes back through the
//! [`PooledConnection`] guard, with any open transaction rolled back and its
//! session flags and isolation level restored.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Deserialize;

use crate::backends::{DatabaseBackend, DatabaseBackendRegistry, DatabaseConnection, DriverError, SqlDialect};
use crate::transactions::IsolationLevel;

/// Pool configuration, deserializable from any serde source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabasePoolConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout_seconds: u64,
    pub busy_timeout_millis: u64,
    pub test_before_acquire: bool,
}

impl Default for DatabasePoolConfig {
    fn default() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
            busy_timeout_millis: 5000,
            test_before_acquire: true,
        }
    }
}

impl DatabasePoolConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout_seconds(mut self, seconds: u64) -> Self {
        self.acquire_timeout_seconds = seconds;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_seconds)
    }
}

/// Database connection pool error types
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Connection timeout after {timeout_seconds}s")]
    Timeout { timeout_seconds: u64 },

    #[error("Connection acquisition failed: {source}")]
    Connect {
        #[source]
        source: DriverError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Snapshot of pool usage
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    pub max_connections: u32,
    pub open_connections: u32,
    pub idle_connections: usize,
    pub acquire_count: u64,
    pub acquire_errors: u64,
    pub uptime: Duration,
}

struct PoolState {
    idle: Vec<Box<dyn DatabaseConnection>>,
    open: u32,
    closed: bool,
}

struct PoolInner {
    backend: Arc<dyn DatabaseBackend>,
    config: DatabasePoolConfig,
    state: Mutex<PoolState>,
    available: Condvar,
    acquire_count: AtomicU64,
    acquire_errors: AtomicU64,
    created_at: Instant,
}

impl PoolInner {
    fn release(&self, mut conn: Box<dyn DatabaseConnection>) {
        let isolation = IsolationLevel::default_for_dialect(conn.dialect());
        let reset = conn
            .rollback()
            .and_then(|_| conn.set_auto_commit(true))
            .and_then(|_| conn.set_read_only(false))
            .and_then(|_| conn.set_isolation(isolation));

        let mut state = self.state.lock();
        match reset {
            Ok(()) if !state.closed => state.idle.push(conn),
            Ok(()) => state.open -= 1,
            Err(e) => {
                tracing::warn!("Discarding connection that could not be reset: {}", e);
                state.open -= 1;
            }
        }
        drop(state);
        self.available.notify_one();
    }

    fn failed(&self, error: PoolError) -> PoolError {
        self.acquire_errors.fetch_add(1, Ordering::Relaxed);
        tracing::error!("Failed to acquire database connection: {}", error);
        error
    }
}

/// Bounded pool of connections to one database
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(backend: Arc<dyn DatabaseBackend>, mut config: DatabasePoolConfig) -> Result<Self, PoolError> {
        if config.max_connections == 0 {
            return Err(PoolError::Configuration {
                message: "max_connections must be at least 1".to_string(),
            });
        }
        if let Some(limit) = backend.connection_limit(&config) {
            if config.max_connections > limit {
                tracing::warn!(
                    "{} allows at most {} connections, lowering max_connections from {}",
                    config.url,
                    limit,
                    config.max_connections
                );
                config.max_connections = limit;
            }
        }
        tracing::debug!(
            "Creating {} pool with at most {} connections",
            backend.backend_type(),
            config.max_connections
        );
        Ok(Self {
            inner: Arc::new(PoolInner {
                backend,
                config,
                state: Mutex::new(PoolState {
                    idle: Vec::new(),
                    open: 0,
                    closed: false,
                }),
                available: Condvar::new(),
                acquire_count: AtomicU64::new(0),
                acquire_errors: AtomicU64::new(0),
                created_at: Instant::now(),
            }),
        })
    }

    /// Pick the backend from the URL scheme
    pub fn connect(config: DatabasePoolConfig) -> Result<Self, PoolError> {
        let backend = DatabaseBackendRegistry::with_defaults()
            .for_url(&config.url)
            .map_err(|source| PoolError::Connect { source })?;
        Self::new(backend, config)
    }

    pub fn config(&self) -> &DatabasePoolConfig {
        &self.inner.config
    }

    pub fn dialect(&self) -> SqlDialect {
        self.inner.backend.sql_dialect()
    }

    /// Check out a connection, waiting up to the acquire timeout
    pub fn acquire(&self) -> Result<PooledConnection, PoolError> {
        let inner = &self.inner;
        inner.acquire_count.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + inner.config.acquire_timeout();

        let mut state = inner.state.lock();
        loop {
            if state.closed {
                return Err(inner.failed(PoolError::Closed));
            }

            if let Some(mut conn) = state.idle.pop() {
                if inner.config.test_before_acquire && !MutexGuard::unlocked(&mut state, || conn.is_valid()) {
                    tracing::warn!("Dropping invalid idle connection");
                    state.open -= 1;
                    continue;
                }
                tracing::debug!(
                    "Database connection acquired (open: {}, idle: {})",
                    state.open,
                    state.idle.len()
                );
                return Ok(self.guard(conn));
            }

            if state.open < inner.config.max_connections {
                state.open += 1;
                let connected = MutexGuard::unlocked(&mut state, || inner.backend.connect(&inner.config));
                return match connected {
                    Ok(conn) => {
                        tracing::debug!("Opened new database connection (open: {})", state.open);
                        Ok(self.guard(conn))
                    }
                    Err(source) => {
                        state.open -= 1;
                        drop(state);
                        inner.available.notify_one();
                        Err(inner.failed(PoolError::Connect { source }))
                    }
                };
            }

            if inner.available.wait_until(&mut state, deadline).timed_out() {
                return Err(inner.failed(PoolError::Timeout {
                    timeout_seconds: inner.config.acquire_timeout_seconds,
                }));
            }
        }
    }

    fn guard(&self, conn: Box<dyn DatabaseConnection>) -> PooledConnection {
        PooledConnection {
            conn: Some(conn),
            pool: Arc::clone(&self.inner),
        }
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            max_connections: self.inner.config.max_connections,
            open_connections: state.open,
            idle_connections: state.idle.len(),
            acquire_count: self.inner.acquire_count.load(Ordering::Relaxed),
            acquire_errors: self.inner.acquire_errors.load(Ordering::Relaxed),
            uptime: self.inner.created_at.elapsed(),
        }
    }

    /// Close idle connections and refuse further acquires; checked out
    /// connections are closed when they come back
    pub fn close(&self) {
        let mut state = self.inner.state.lock();
        state.closed = true;
        let idle = std::mem::take(&mut state.idle);
        state.open -= idle.len() as u32;
        drop(state);
        self.inner.available.notify_all();
        tracing::debug!("Closed connection pool, dropped {} idle connections", idle.len());
    }
}

/// Checked out connection, returned to the pool on drop
pub struct PooledConnection {
    conn: Option<Box<dyn DatabaseConnection>>,
    pool: Arc<PoolInner>,
}

impl Deref for PooledConnection {
    type Target = dyn DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_deref().expect("connection is present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_deref_mut().expect("connection is present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{DatabaseBackendType, DatabaseValue, DriverResult, Row, SqliteBackend};
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn pool(dir: &tempfile::TempDir, max_connections: u32) -> ConnectionPool {
        let url = format!("sqlite://{}", dir.path().join("pool.db").display());
        let config = DatabasePoolConfig::new(url)
            .max_connections(max_connections)
            .acquire_timeout_seconds(1);
        ConnectionPool::new(Arc::new(SqliteBackend), config).unwrap()
    }

    #[test]
    fn test_config_defaults_and_deserialize() {
        let config: DatabasePoolConfig =
            serde_json::from_str(r#"{"url": "sqlite://app.db", "max_connections": 4}"#).unwrap();
        assert_eq!(config.url, "sqlite://app.db");
        assert_eq!(config.max_connections, 4);
        assert_eq!(config.acquire_timeout_seconds, 30);
        assert!(config.test_before_acquire);
    }

    #[test]
    fn test_connections_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 2);
        drop(pool.acquire().unwrap());
        drop(pool.acquire().unwrap());

        let stats = pool.stats();
        assert_eq!(stats.open_connections, 1);
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.acquire_count, 2);
    }

    #[test]
    fn test_exhausted_pool_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 1);
        let _held = pool.acquire().unwrap();

        let err = pool.acquire().err().unwrap();
        assert!(matches!(err, PoolError::Timeout { timeout_seconds: 1 }));
        assert_eq!(pool.stats().acquire_errors, 1);
    }

    #[test]
    fn test_waiter_gets_released_connection() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 1);
        let held = pool.acquire().unwrap();

        let waiter = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(50));
        drop(held);
        assert!(waiter.join().unwrap().is_ok());
    }

    #[test]
    fn test_returned_connection_is_reset() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 1);
        {
            let mut conn = pool.acquire().unwrap();
            conn.execute("CREATE TABLE t (v INTEGER)", &[]).unwrap();
            conn.set_auto_commit(false).unwrap();
            conn.execute("INSERT INTO t (v) VALUES (1)", &[]).unwrap();
            conn.set_read_only(true).unwrap();
        }

        let mut conn = pool.acquire().unwrap();
        let rows = conn.query("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_by_index(0).and_then(|v| v.as_i64()), Some(0));
        assert!(conn.execute("INSERT INTO t (v) VALUES (2)", &[]).is_ok());
    }

    fn read_uncommitted(conn: &mut PooledConnection) -> Option<i64> {
        let rows = conn.query("PRAGMA read_uncommitted", &[]).unwrap();
        rows[0].get_by_index(0).and_then(|v| v.as_i64())
    }

    #[test]
    fn test_returned_connection_gets_default_isolation() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 1);
        {
            let mut conn = pool.acquire().unwrap();
            conn.set_isolation(IsolationLevel::ReadUncommitted).unwrap();
            assert_eq!(read_uncommitted(&mut conn), Some(1));
        }

        let mut conn = pool.acquire().unwrap();
        assert_eq!(read_uncommitted(&mut conn), Some(0));
        assert_eq!(pool.stats().open_connections, 1);
    }

    #[test]
    fn test_in_memory_database_is_shared_by_one_connection() {
        let pool = ConnectionPool::connect(DatabasePoolConfig::default()).unwrap();
        assert_eq!(pool.stats().max_connections, 1);
        {
            let mut conn = pool.acquire().unwrap();
            conn.execute("CREATE TABLE t (v INTEGER)", &[]).unwrap();
            conn.execute("INSERT INTO t (v) VALUES (1)", &[]).unwrap();
        }

        let mut conn = pool.acquire().unwrap();
        let rows = conn.query("SELECT COUNT(*) FROM t", &[]).unwrap();
        assert_eq!(rows[0].get_by_index(0).and_then(|v| v.as_i64()), Some(1));

        let file = format!("sqlite://{}", std::env::temp_dir().join("unused.db").display());
        assert_eq!(SqliteBackend.connection_limit(&DatabasePoolConfig::new(file)), None);
    }

    /// SQLite connection whose liveness check is slow and can be switched off
    struct FlakyConnection {
        inner: Box<dyn DatabaseConnection>,
        valid: Arc<AtomicBool>,
        check_delay: Duration,
    }

    impl DatabaseConnection for FlakyConnection {
        fn dialect(&self) -> SqlDialect {
            self.inner.dialect()
        }
        fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<u64> {
            self.inner.execute(sql, params)
        }
        fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Row>> {
            self.inner.query(sql, params)
        }
        fn query_multi(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Vec<Row>>> {
            self.inner.query_multi(sql, params)
        }
        fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
            self.inner.set_auto_commit(auto_commit)
        }
        fn set_read_only(&mut self, read_only: bool) -> DriverResult<()> {
            self.inner.set_read_only(read_only)
        }
        fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()> {
            self.inner.set_isolation(level)
        }
        fn commit(&mut self) -> DriverResult<()> {
            self.inner.commit()
        }
        fn rollback(&mut self) -> DriverResult<()> {
            self.inner.rollback()
        }
        fn set_savepoint(&mut self, name: &str) -> DriverResult<()> {
            self.inner.set_savepoint(name)
        }
        fn rollback_to_savepoint(&mut self, name: &str) -> DriverResult<()> {
            self.inner.rollback_to_savepoint(name)
        }
        fn release_savepoint(&mut self, name: &str) -> DriverResult<()> {
            self.inner.release_savepoint(name)
        }
        fn is_valid(&mut self) -> bool {
            thread::sleep(self.check_delay);
            self.valid.load(Ordering::SeqCst) && self.inner.is_valid()
        }
    }

    struct FlakyBackend {
        valid: Arc<AtomicBool>,
        check_delay: Duration,
    }

    impl DatabaseBackend for FlakyBackend {
        fn connect(&self, config: &DatabasePoolConfig) -> DriverResult<Box<dyn DatabaseConnection>> {
            Ok(Box::new(FlakyConnection {
                inner: SqliteBackend.connect(config)?,
                valid: Arc::clone(&self.valid),
                check_delay: self.check_delay,
            }))
        }
        fn sql_dialect(&self) -> SqlDialect {
            SqlDialect::Sqlite
        }
        fn backend_type(&self) -> DatabaseBackendType {
            DatabaseBackendType::SQLite
        }
    }

    fn flaky_pool(check_delay: Duration) -> (ConnectionPool, Arc<AtomicBool>) {
        let valid = Arc::new(AtomicBool::new(true));
        let backend = FlakyBackend {
            valid: Arc::clone(&valid),
            check_delay,
        };
        let config = DatabasePoolConfig::new("sqlite::memory:").max_connections(2);
        (ConnectionPool::new(Arc::new(backend), config).unwrap(), valid)
    }

    #[test]
    fn test_invalid_idle_connection_is_replaced() {
        let (pool, valid) = flaky_pool(Duration::ZERO);
        drop(pool.acquire().unwrap());
        assert_eq!(pool.stats().idle_connections, 1);

        valid.store(false, Ordering::SeqCst);
        let _conn = pool.acquire().unwrap();
        let stats = pool.stats();
        assert_eq!(stats.open_connections, 1);
        assert_eq!(stats.idle_connections, 0);
    }

    #[test]
    fn test_validation_runs_without_holding_the_pool_lock() {
        let (pool, _valid) = flaky_pool(Duration::from_millis(500));
        let first = pool.acquire().unwrap();
        let second = pool.acquire().unwrap();
        drop(first);
        drop(second);

        let checking = {
            let pool = pool.clone();
            thread::spawn(move || pool.acquire().map(|_| ()))
        };
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let stats = pool.stats();
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(stats.idle_connections, 1);

        assert!(checking.join().unwrap().is_ok());
    }

    #[test]
    fn test_closed_pool_refuses_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let pool = pool(&dir, 1);
        pool.close();
        assert!(matches!(pool.acquire().err().unwrap(), PoolError::Closed));
    }
}
