//! Execution Engine
//!
//! Runs generated queries on one borrowed connection. Every call is traced
//! and, when a profiler is injected, timed.

use std::time::Instant;

use crate::backends::{DatabaseConnection, DatabaseValue, DriverResult, Row};
use crate::error::{OrmError, OrmResult, QueryError};
use crate::profiler::{Profiler, QueryKind};
use crate::query::{BatchQuery, Query};

pub struct Engine<'q> {
    conn: &'q mut dyn DatabaseConnection,
    profiler: Option<&'q Profiler>,
}

impl<'q> Engine<'q> {
    pub fn new(conn: &'q mut dyn DatabaseConnection, profiler: Option<&'q Profiler>) -> Self {
        Self { conn, profiler }
    }

    /// Shorter lived engine over the same connection
    pub fn reborrow(&mut self) -> Engine<'_> {
        Engine {
            conn: &mut *self.conn,
            profiler: self.profiler,
        }
    }

    pub fn connection(&mut self) -> &mut dyn DatabaseConnection {
        &mut *self.conn
    }

    fn timed<R>(
        &mut self,
        kind: QueryKind,
        sql: &str,
        repetitions: u64,
        run: impl FnOnce(&mut dyn DatabaseConnection) -> DriverResult<R>,
    ) -> DriverResult<R> {
        let start = Instant::now();
        let result = run(&mut *self.conn);
        if let Some(profiler) = self.profiler {
            profiler.record(kind, sql, start.elapsed(), repetitions);
        }
        result
    }

    /// Execute a statement without result set and return the affected row count
    pub fn update(&mut self, query: &Query) -> OrmResult<u64> {
        tracing::debug!("Executing update: {}", query);
        let params = query.params();
        self.timed(QueryKind::Update, &query.sql, 1, |conn| conn.execute(&query.sql, &params))
            .map_err(|e| OrmError::driver(&query.sql, &params, e))
    }

    /// Run a query and decode every row
    pub fn query<T>(&mut self, query: &Query, decode: impl Fn(Row) -> OrmResult<T>) -> OrmResult<Vec<T>> {
        tracing::debug!("Executing query: {}", query);
        let params = query.params();
        let rows = self
            .timed(QueryKind::Query, &query.sql, 1, |conn| conn.query(&query.sql, &params))
            .map_err(|e| OrmError::driver(&query.sql, &params, e))?;
        rows.into_iter().map(decode).collect()
    }

    /// Insert one row and return the key generated by the database
    ///
    /// The driver is asked for the key first; when it has none, `last_id_sql`
    /// is run on the same connection.
    pub fn insert(&mut self, query: &Query, last_id_sql: &str) -> OrmResult<DatabaseValue> {
        tracing::debug!("Executing insert: {}", query);
        let params = query.params();
        let count = self
            .timed(QueryKind::Insert, &query.sql, 1, |conn| conn.execute(&query.sql, &params))
            .map_err(|e| OrmError::driver(&query.sql, &params, e))?;
        if count == 0 {
            return Err(QueryError::NothingInserted {
                sql: query.sql.clone(),
            }
            .into());
        }

        match self.conn.generated_key() {
            Ok(Some(key)) if !key.is_null() => return Ok(key),
            Ok(_) => {}
            Err(e) if e.is_unsupported() => {}
            Err(e) => tracing::warn!("Driver failed to return the generated key: {}", e),
        }

        tracing::warn!("Retrieving inserted id with fallback query: {}", last_id_sql);
        let fallback = self
            .timed(QueryKind::Query, last_id_sql, 1, |conn| conn.query(last_id_sql, &[]))
            .map_err(|e| OrmError::GeneratedKey {
                sql: query.sql.clone(),
                source: Some(e),
            })?;
        fallback
            .first()
            .and_then(|row| row.get_by_index(0))
            .filter(|key| !key.is_null())
            .cloned()
            .ok_or_else(|| OrmError::GeneratedKey {
                sql: query.sql.clone(),
                source: None,
            })
    }

    /// Execute one statement per parameter row in chunks of
    /// [`BATCH_CHUNK_SIZE`](crate::query::BATCH_CHUNK_SIZE) and sum the counts
    pub fn batch(&mut self, query: &BatchQuery) -> OrmResult<u64> {
        if query.is_empty() {
            return Ok(0);
        }
        tracing::debug!("Executing batch of {} rows: {}", query.len(), query.sql);

        let mut total = 0;
        for chunk in query.chunks() {
            let repetitions = chunk.len() as u64;
            total += self
                .timed(QueryKind::Batch, &query.sql, repetitions, |conn| {
                    conn.execute_batch(&query.sql, &chunk)
                })
                .map_err(|e| OrmError::driver(&query.sql, chunk.first().map_or(&[][..], |r| r.as_slice()), e))?;
        }
        Ok(total)
    }

    /// Run statements that produce several result sets
    pub fn query_multi(&mut self, query: &Query) -> OrmResult<Vec<Vec<Row>>> {
        tracing::debug!("Executing multi query: {}", query);
        self.multi(QueryKind::Execute, query)
    }

    /// Call a stored procedure and collect its result sets
    pub fn call(&mut self, query: &Query) -> OrmResult<Vec<Vec<Row>>> {
        tracing::debug!("Calling procedure: {}", query);
        self.multi(QueryKind::Call, query)
    }

    fn multi(&mut self, kind: QueryKind, query: &Query) -> OrmResult<Vec<Vec<Row>>> {
        let params = query.params();
        self.timed(kind, &query.sql, 1, |conn| conn.query_multi(&query.sql, &params))
            .map_err(|e| OrmError::driver(&query.sql, &params, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{DriverError, SqlDialect};
    use crate::transactions::IsolationLevel;
    use std::sync::Arc;

    /// Connection answering from canned values
    #[derive(Default)]
    struct ScriptedConnection {
        affected: u64,
        native_key: Option<DatabaseValue>,
        fallback: Vec<Row>,
        fallback_fails: bool,
        batches: Vec<usize>,
        statements: Vec<String>,
    }

    impl DatabaseConnection for ScriptedConnection {
        fn dialect(&self) -> SqlDialect {
            SqlDialect::Sqlite
        }

        fn execute(&mut self, sql: &str, _: &[DatabaseValue]) -> DriverResult<u64> {
            self.statements.push(sql.to_string());
            Ok(self.affected)
        }

        fn query(&mut self, sql: &str, _: &[DatabaseValue]) -> DriverResult<Vec<Row>> {
            self.statements.push(sql.to_string());
            if self.fallback_fails {
                return Err(DriverError::failed("no such function: last_insert_id"));
            }
            Ok(self.fallback.clone())
        }

        fn query_multi(&mut self, _: &str, _: &[DatabaseValue]) -> DriverResult<Vec<Vec<Row>>> {
            Ok(vec![self.fallback.clone(), Vec::new()])
        }

        fn execute_batch(&mut self, _: &str, rows: &[Vec<DatabaseValue>]) -> DriverResult<u64> {
            self.batches.push(rows.len());
            Ok(rows.len() as u64)
        }

        fn generated_key(&mut self) -> DriverResult<Option<DatabaseValue>> {
            match &self.native_key {
                Some(key) => Ok(Some(key.clone())),
                None => Err(DriverError::unsupported("generated keys")),
            }
        }

        fn set_auto_commit(&mut self, _: bool) -> DriverResult<()> {
            Ok(())
        }

        fn set_read_only(&mut self, _: bool) -> DriverResult<()> {
            Ok(())
        }

        fn set_isolation(&mut self, _: IsolationLevel) -> DriverResult<()> {
            Ok(())
        }

        fn commit(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn rollback(&mut self) -> DriverResult<()> {
            Ok(())
        }

        fn set_savepoint(&mut self, _: &str) -> DriverResult<()> {
            Ok(())
        }

        fn rollback_to_savepoint(&mut self, _: &str) -> DriverResult<()> {
            Ok(())
        }

        fn release_savepoint(&mut self, _: &str) -> DriverResult<()> {
            Ok(())
        }

        fn is_valid(&mut self) -> bool {
            true
        }
    }

    fn id_row(id: i64) -> Row {
        Row::new(Arc::from(vec!["id".to_string()]), vec![DatabaseValue::Int64(id)])
    }

    fn insert() -> Query {
        Query::new("INSERT INTO \"t\" (\"v\") VALUES (?)")
    }

    #[test]
    fn test_insert_prefers_native_key() {
        let mut conn = ScriptedConnection {
            affected: 1,
            native_key: Some(DatabaseValue::Int64(7)),
            ..Default::default()
        };
        let key = Engine::new(&mut conn, None).insert(&insert(), "SELECT 1").unwrap();
        assert_eq!(key, DatabaseValue::Int64(7));
        assert_eq!(conn.statements.len(), 1);
    }

    #[test]
    fn test_insert_falls_back_to_last_id_query() {
        let mut conn = ScriptedConnection {
            affected: 1,
            fallback: vec![id_row(42)],
            ..Default::default()
        };
        let key = Engine::new(&mut conn, None)
            .insert(&insert(), "SELECT last_insert_rowid()")
            .unwrap();
        assert_eq!(key, DatabaseValue::Int64(42));
        assert_eq!(conn.statements.last().unwrap(), "SELECT last_insert_rowid()");
    }

    #[test]
    fn test_insert_without_any_key_is_fatal() {
        let mut conn = ScriptedConnection {
            affected: 1,
            ..Default::default()
        };
        let err = Engine::new(&mut conn, None).insert(&insert(), "SELECT 1").unwrap_err();
        assert!(matches!(err, OrmError::GeneratedKey { source: None, .. }));
    }

    #[test]
    fn test_failing_fallback_query_is_a_key_error() {
        let mut conn = ScriptedConnection {
            affected: 1,
            fallback_fails: true,
            ..Default::default()
        };
        let err = Engine::new(&mut conn, None)
            .insert(&insert(), "SELECT last_insert_id()")
            .unwrap_err();

        assert!(!err.is_driver_error());
        match &err {
            OrmError::GeneratedKey { sql, source: Some(source) } => {
                assert!(sql.starts_with("INSERT INTO"));
                assert!(source.to_string().contains("last_insert_id"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_insert_of_nothing_is_an_error() {
        let mut conn = ScriptedConnection::default();
        let err = Engine::new(&mut conn, None).insert(&insert(), "SELECT 1").unwrap_err();
        assert!(matches!(err, OrmError::Query(QueryError::NothingInserted { .. })));
    }

    #[test]
    fn test_batch_is_chunked_and_profiled() {
        let mut conn = ScriptedConnection::default();
        let profiler = Profiler::new();
        profiler.activate();

        let row = vec![crate::query::QueryValue::new(
            "v",
            crate::backends::WireType::Integer,
            DatabaseValue::Int32(1),
        )];
        let batch = BatchQuery::new("INSERT INTO \"t\" (\"v\") VALUES (?)", vec![row; 2500]);
        let total = Engine::new(&mut conn, Some(&profiler)).batch(&batch).unwrap();

        assert_eq!(total, 2500);
        assert_eq!(conn.batches, vec![1000, 1000, 500]);
        let logs = profiler.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, QueryKind::Batch);
        assert_eq!(logs[0].repetitions, 2500);
    }

    #[test]
    fn test_empty_batch_skips_the_driver() {
        let mut conn = ScriptedConnection::default();
        let batch = BatchQuery::new("INSERT", Vec::new());
        assert_eq!(Engine::new(&mut conn, None).batch(&batch).unwrap(), 0);
        assert!(conn.batches.is_empty());
    }
}
