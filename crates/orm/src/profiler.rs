//! Query profiler
//!
//! Aggregates execution time per statement. Logs are keyed by a SHA-256
//! fingerprint of the statement kind and its whitespace-normalized SQL, so
//! the same statement formatted differently lands in one entry.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// Kind of executed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Batch,
    Update,
    Insert,
    Execute,
    Query,
    Call,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Batch => "BATCH",
            QueryKind::Update => "UPDATE",
            QueryKind::Insert => "INSERT",
            QueryKind::Execute => "EXECUTE",
            QueryKind::Query => "QUERY",
            QueryKind::Call => "CALL",
        }
    }
}

/// Accumulated statistics of one statement
#[derive(Debug, Clone, PartialEq)]
pub struct QueryLog {
    pub kind: QueryKind,
    pub sql: String,
    pub duration: Duration,
    pub repetitions: u64,
}

impl QueryLog {
    pub fn average(&self) -> Duration {
        match u32::try_from(self.repetitions) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.duration / n,
            Err(_) => self.duration.div_f64(self.repetitions as f64),
        }
    }
}

/// Collects [`QueryLog`]s while active
#[derive(Debug, Default)]
pub struct Profiler {
    active: AtomicBool,
    logs: DashMap<String, QueryLog>,
}

impl Profiler {
    /// Inactive profiler without logs
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self) {
        self.active.store(true, Ordering::Release);
    }

    pub fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Record an execution, ignored while inactive
    pub fn record(&self, kind: QueryKind, sql: &str, duration: Duration, repetitions: u64) {
        if !self.is_active() {
            return;
        }
        let sql = normalize(sql);
        let key = fingerprint(kind, &sql);
        let mut entry = self.logs.entry(key).or_insert_with(|| QueryLog {
            kind,
            sql,
            duration: Duration::ZERO,
            repetitions: 0,
        });
        entry.duration += duration;
        entry.repetitions += repetitions;
    }

    /// Snapshot of every log, slowest first
    pub fn logs(&self) -> Vec<QueryLog> {
        let mut logs: Vec<QueryLog> = self.logs.iter().map(|e| e.value().clone()).collect();
        logs.sort_by(|a, b| b.duration.cmp(&a.duration));
        logs
    }

    pub fn clear(&self) {
        self.logs.clear();
    }
}

/// Collapse every whitespace run to one space
pub fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hex SHA-256 of the kind and the normalized SQL
pub fn fingerprint(kind: QueryKind, normalized_sql: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(normalized_sql.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inactive_profiler_records_nothing() {
        let profiler = Profiler::new();
        profiler.record(QueryKind::Query, "SELECT 1", Duration::from_millis(1), 1);
        assert!(profiler.logs().is_empty());
    }

    #[test]
    fn test_formatting_does_not_split_entries() {
        let profiler = Profiler::new();
        profiler.activate();
        profiler.record(QueryKind::Query, "SELECT *\n  FROM t", Duration::from_millis(2), 1);
        profiler.record(QueryKind::Query, "SELECT * FROM t", Duration::from_millis(4), 1);
        profiler.record(QueryKind::Update, "SELECT * FROM t", Duration::from_millis(1), 1);

        let logs = profiler.logs();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].sql, "SELECT * FROM t");
        assert_eq!(logs[0].repetitions, 2);
        assert_eq!(logs[0].average(), Duration::from_millis(3));
    }

    #[test]
    fn test_fingerprint_is_hex_sha256() {
        let key = fingerprint(QueryKind::Batch, "INSERT");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, fingerprint(QueryKind::Insert, "INSERT"));
    }
}
