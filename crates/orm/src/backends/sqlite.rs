//! SQLite driver built on rusqlite
//!
//! Transactions are opened lazily: with auto-commit disabled the first
//! statement (or savepoint) after a commit or rollback issues `BEGIN`.

use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{params_from_iter, Batch, Connection, Statement, ToSql};

use crate::connection::DatabasePoolConfig;
use crate::transactions::IsolationLevel;

use super::core::{DatabaseBackend, DatabaseConnection, DatabaseValue, DriverError, DriverResult, Row};
use super::{DatabaseBackendType, SqlDialect};

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        DriverError::with_source(err.to_string(), err)
    }
}

impl ToSql for DatabaseValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        let output = match self {
            DatabaseValue::Null => ToSqlOutput::Owned(Value::Null),
            DatabaseValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(*b as i64)),
            DatabaseValue::Int32(i) => ToSqlOutput::Owned(Value::Integer(*i as i64)),
            DatabaseValue::Int64(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            DatabaseValue::Float32(f) => ToSqlOutput::Owned(Value::Real(*f as f64)),
            DatabaseValue::Float64(f) => ToSqlOutput::Owned(Value::Real(*f)),
            DatabaseValue::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            DatabaseValue::Bytes(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
            DatabaseValue::Uuid(u) => ToSqlOutput::Owned(Value::Text(u.to_string())),
            DatabaseValue::DateTime(dt) => ToSqlOutput::Owned(Value::Text(dt.to_rfc3339())),
            DatabaseValue::NaiveDateTime(dt) => {
                ToSqlOutput::Owned(Value::Text(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()))
            }
            DatabaseValue::Date(d) => ToSqlOutput::Owned(Value::Text(d.format("%Y-%m-%d").to_string())),
            DatabaseValue::Time(t) => ToSqlOutput::Owned(Value::Text(t.format("%H:%M:%S%.f").to_string())),
            DatabaseValue::Json(j) => ToSqlOutput::Owned(Value::Text(j.to_string())),
        };
        Ok(output)
    }
}

fn from_value_ref(value: ValueRef<'_>) -> DatabaseValue {
    match value {
        ValueRef::Null => DatabaseValue::Null,
        ValueRef::Integer(i) => DatabaseValue::Int64(i),
        ValueRef::Real(f) => DatabaseValue::Float64(f),
        ValueRef::Text(t) => DatabaseValue::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => DatabaseValue::Bytes(b.to_vec()),
    }
}

fn read_rows(stmt: &mut Statement<'_>, params: &[DatabaseValue]) -> rusqlite::Result<Vec<Row>> {
    let columns: Arc<[String]> = stmt
        .column_names()
        .into_iter()
        .map(String::from)
        .collect::<Vec<_>>()
        .into();
    let width = columns.len();

    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(from_value_ref(row.get_ref(i)?));
        }
        out.push(Row::new(columns.clone(), values));
    }
    Ok(out)
}

fn run_batch(conn: &Connection, sql: &str, rows: &[Vec<DatabaseValue>]) -> rusqlite::Result<u64> {
    let mut stmt = conn.prepare_cached(sql)?;
    let mut total = 0u64;
    for params in rows {
        total += stmt.execute(params_from_iter(params.iter()))? as u64;
    }
    Ok(total)
}

/// Factory for SQLite connections
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl DatabaseBackend for SqliteBackend {
    fn connect(&self, config: &DatabasePoolConfig) -> DriverResult<Box<dyn DatabaseConnection>> {
        Ok(Box::new(SqliteConnection::open(config)?))
    }

    fn sql_dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn backend_type(&self) -> DatabaseBackendType {
        DatabaseBackendType::SQLite
    }

    /// Every `:memory:` connection opens its own private database
    fn connection_limit(&self, config: &DatabasePoolConfig) -> Option<u32> {
        (database_path(&config.url) == ":memory:").then_some(1)
    }
}

fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// A single SQLite connection
pub struct SqliteConnection {
    conn: Connection,
    auto_commit: bool,
}

impl SqliteConnection {
    /// Open the database named by the config URL (`sqlite://path`, `sqlite::memory:` or `file:` URI)
    pub fn open(config: &DatabasePoolConfig) -> DriverResult<Self> {
        let path = database_path(&config.url);

        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_millis))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        tracing::debug!("Opened SQLite connection to {}", path);
        Ok(Self {
            conn,
            auto_commit: true,
        })
    }

    fn begin_if_needed(&mut self) -> DriverResult<()> {
        if !self.auto_commit && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl DatabaseConnection for SqliteConnection {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::Sqlite
    }

    fn execute(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<u64> {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        let count = stmt.execute(params_from_iter(params.iter()))?;
        Ok(count as u64)
    }

    fn query(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Row>> {
        self.begin_if_needed()?;
        let mut stmt = self.conn.prepare_cached(sql)?;
        Ok(read_rows(&mut stmt, params)?)
    }

    fn query_multi(&mut self, sql: &str, params: &[DatabaseValue]) -> DriverResult<Vec<Vec<Row>>> {
        self.begin_if_needed()?;

        let mut results = Vec::new();
        let mut remaining = params;
        let mut batch = Batch::new(&self.conn, sql);
        while let Some(mut stmt) = batch.next()? {
            let wanted = stmt.parameter_count();
            if wanted > remaining.len() {
                return Err(DriverError::failed(format!(
                    "Statement expects {} parameters but only {} are left",
                    wanted,
                    remaining.len()
                )));
            }
            let (own, rest) = remaining.split_at(wanted);
            remaining = rest;

            if stmt.column_count() > 0 {
                results.push(read_rows(&mut stmt, own)?);
            } else {
                stmt.execute(params_from_iter(own.iter()))?;
            }
        }
        Ok(results)
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<DatabaseValue>]) -> DriverResult<u64> {
        self.begin_if_needed()?;

        // In auto-commit mode one chunk is applied atomically
        let wrap = !self.in_transaction();
        if wrap {
            self.conn.execute_batch("BEGIN")?;
        }
        match run_batch(&self.conn, sql, rows) {
            Ok(total) => {
                if wrap {
                    self.conn.execute_batch("COMMIT")?;
                }
                Ok(total)
            }
            Err(err) => {
                if wrap {
                    if let Err(rollback_err) = self.conn.execute_batch("ROLLBACK") {
                        tracing::error!("Failed to roll back batch: {}", rollback_err);
                    }
                }
                Err(err.into())
            }
        }
    }

    fn generated_key(&mut self) -> DriverResult<Option<DatabaseValue>> {
        Ok(Some(DatabaseValue::Int64(self.conn.last_insert_rowid())))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        if auto_commit && self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()> {
        let flag = if read_only { "ON" } else { "OFF" };
        self.conn.execute_batch(&format!("PRAGMA query_only = {};", flag))?;
        Ok(())
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()> {
        let read_uncommitted = match level {
            IsolationLevel::ReadUncommitted => 1,
            IsolationLevel::Serializable => 0,
            IsolationLevel::ReadCommitted | IsolationLevel::RepeatableRead => {
                return Err(DriverError::unsupported("isolation levels other than READ UNCOMMITTED and SERIALIZABLE"));
            }
        };
        self.conn
            .execute_batch(&format!("PRAGMA read_uncommitted = {};", read_uncommitted))?;
        Ok(())
    }

    fn commit(&mut self) -> DriverResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("COMMIT")?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> DriverResult<()> {
        if self.in_transaction() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn set_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.begin_if_needed()?;
        self.conn.execute_batch(&format!("SAVEPOINT \"{}\";", name))?;
        Ok(())
    }

    fn rollback_to_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.conn
            .execute_batch(&format!("ROLLBACK TO SAVEPOINT \"{}\";", name))?;
        Ok(())
    }

    fn release_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.conn.execute_batch(&format!("RELEASE SAVEPOINT \"{}\";", name))?;
        Ok(())
    }

    fn is_valid(&mut self) -> bool {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .is_ok()
    }
}
