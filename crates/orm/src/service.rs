//! Service: the entry point for running statements
//!
//! Every block checks a connection out of the pool, runs the caller's
//! closure on it and hands it back. Transactions commit when the closure
//! returns `Ok` and roll back otherwise; a panic rolls back through the
//! connection guard.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::connection::{ConnectionPool, DatabasePoolConfig, PoolError};
use crate::engine::Engine;
use crate::error::{OrmError, OrmResult, QueryError};
use crate::operations::{QueryConnection, TransactionConnection};
use crate::profiler::Profiler;
use crate::transactions::TransactionConfig;

/// Catalog, pool and optional profiler shared by every block
#[derive(Clone)]
pub struct Service {
    catalog: Arc<Catalog>,
    pool: ConnectionPool,
    profiler: Option<Arc<Profiler>>,
}

impl Service {
    /// Fails when the pool speaks another dialect than the catalog
    pub fn new(catalog: Arc<Catalog>, pool: ConnectionPool) -> OrmResult<Self> {
        if pool.dialect() != catalog.dialect() {
            return Err(PoolError::Configuration {
                message: format!(
                    "catalog is built for {} but the pool connects to {}",
                    catalog.dialect().name(),
                    pool.dialect().name()
                ),
            }
            .into());
        }
        Ok(Self {
            catalog,
            pool,
            profiler: None,
        })
    }

    /// Open a pool for `config` with the backend matching its URL
    pub fn connect(catalog: Arc<Catalog>, config: DatabasePoolConfig) -> OrmResult<Self> {
        let pool = ConnectionPool::connect(config)?;
        Self::new(catalog, pool)
    }

    pub fn with_profiler(mut self, profiler: Arc<Profiler>) -> Self {
        self.profiler = Some(profiler);
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn profiler(&self) -> Option<&Profiler> {
        self.profiler.as_deref()
    }

    /// Run `body` with every statement committed as it executes
    pub fn autocommit<R, F>(&self, body: F) -> OrmResult<R>
    where
        F: FnOnce(&mut QueryConnection<'_>) -> OrmResult<R>,
    {
        self.scoped(false, body)
    }

    /// Like [`autocommit`](Self::autocommit) on a connection refusing writes
    pub fn read_only<R, F>(&self, body: F) -> OrmResult<R>
    where
        F: FnOnce(&mut QueryConnection<'_>) -> OrmResult<R>,
    {
        self.scoped(true, body)
    }

    fn scoped<R, F>(&self, read_only: bool, body: F) -> OrmResult<R>
    where
        F: FnOnce(&mut QueryConnection<'_>) -> OrmResult<R>,
    {
        let mut conn = self.pool.acquire()?;
        if read_only {
            conn.set_read_only(true)
                .map_err(|e| OrmError::command("SET READ ONLY", e))?;
        }
        let mut query = QueryConnection::new(&self.catalog, Engine::new(&mut *conn, self.profiler()));
        body(&mut query)
    }

    /// Run `body` in a transaction with the connection's default options
    pub fn transaction<R, F>(&self, body: F) -> OrmResult<R>
    where
        F: FnOnce(&mut TransactionConnection<'_>) -> OrmResult<R>,
    {
        self.transaction_with(TransactionConfig::default(), body)
    }

    /// Run `body` in a transaction, committing on `Ok`
    ///
    /// On `Err` every change is rolled back and the error is returned
    /// wrapped in [`OrmError::Transaction`].
    pub fn transaction_with<R, F>(&self, config: TransactionConfig, body: F) -> OrmResult<R>
    where
        F: FnOnce(&mut TransactionConnection<'_>) -> OrmResult<R>,
    {
        let dialect = self.catalog.dialect();
        if let Some(level) = config.isolation_level.filter(|l| !l.is_supported_by(dialect)) {
            return Err(QueryError::Unsupported {
                dialect: dialect.name(),
                feature: level.as_sql(),
            }
            .into());
        }

        let mut conn = self.pool.acquire()?;
        tracing::debug!("Beginning transaction with config: {:?}", config);

        conn.set_auto_commit(false)
            .map_err(|e| OrmError::command("SET AUTOCOMMIT = 0", e))?;
        if let Some(level) = config.isolation_level {
            conn.set_isolation(level)
                .map_err(|e| OrmError::command(format!("SET TRANSACTION ISOLATION LEVEL {}", level), e))?;
        }
        if config.read_only {
            conn.set_read_only(true)
                .map_err(|e| OrmError::command("SET TRANSACTION READ ONLY", e))?;
        }

        let result = {
            let mut tx = TransactionConnection::new(&self.catalog, Engine::new(&mut *conn, self.profiler()));
            body(&mut tx)
        };

        match result {
            Ok(value) => {
                conn.commit().map_err(|e| OrmError::command("COMMIT", e))?;
                tracing::debug!("Transaction committed successfully");
                Ok(value)
            }
            Err(source) => {
                tracing::warn!("Rolling back transaction: {}", source);
                if let Err(e) = conn.rollback() {
                    tracing::error!("Failed to roll back transaction: {}", e);
                }
                Err(OrmError::Transaction {
                    source: Box::new(source),
                })
            }
        }
    }
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("dialect", &self.catalog.dialect())
            .field("pool", &self.pool.stats())
            .field("profiler", &self.profiler.is_some())
            .finish()
    }
}
