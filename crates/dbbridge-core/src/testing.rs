//! In-memory port doubles for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::array_result::ArrayResult;
use crate::domain::{ColumnInfo, DbError, ErrorInfo, IndexInfo, SqlValue};
use crate::ports::{INativeResult, IResultCache, ISqlConnection, Platform};

/// Scripted connection that records every executed query
#[derive(Default)]
pub struct FakeConnection {
    pub executed: Mutex<Vec<(String, Vec<SqlValue>)>>,
    results: Mutex<HashMap<String, (Vec<String>, Vec<Vec<SqlValue>>)>>,
    failures: Mutex<HashMap<String, ErrorInfo>>,
    last_error: Mutex<Option<ErrorInfo>>,
    pub tables: Vec<String>,
    pub columns: Vec<ColumnInfo>,
    pub indexes: Vec<IndexInfo>,
    pub table_listings: AtomicUsize,
    pub transactions: Mutex<Vec<&'static str>>,
    pub affected_rows: u64,
    pub insert_id: Option<i64>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self {
            affected_rows: 1,
            ..Self::default()
        }
    }

    /// Scripts the result returned for an exact query string
    pub fn respond(&self, sql: &str, columns: &[&str], rows: Vec<Vec<SqlValue>>) {
        self.results.lock().unwrap().insert(
            sql.to_string(),
            (columns.iter().map(|c| c.to_string()).collect(), rows),
        );
    }

    /// Scripts a backend error for an exact query string
    pub fn fail(&self, sql: &str, info: ErrorInfo) {
        self.failures.lock().unwrap().insert(sql.to_string(), info);
    }

    pub fn executed_queries(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .map(|(sql, _)| sql.clone())
            .collect()
    }

    pub fn last_executed(&self) -> Option<(String, Vec<SqlValue>)> {
        self.executed.lock().unwrap().last().cloned()
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().unwrap().len()
    }
}

impl ISqlConnection for FakeConnection {
    fn platform(&self) -> Platform {
        Platform::MySql
    }

    fn execute_query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn INativeResult>, DbError> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if let Some(info) = self.failures.lock().unwrap().get(sql) {
            *self.last_error.lock().unwrap() = Some(info.clone());
            return Err(DbError::Backend(info.clone()));
        }

        match self.results.lock().unwrap().get(sql) {
            Some((columns, rows)) => Ok(Box::new(ArrayResult::new(columns.clone(), rows.clone()))),
            None if crate::sql::is_read_statement(sql) => Ok(Box::new(ArrayResult::default())),
            None => Ok(Box::new(ArrayResult::written(self.affected_rows))),
        }
    }

    fn begin_transaction(&self) -> Result<(), DbError> {
        self.transactions.lock().unwrap().push("begin");
        Ok(())
    }

    fn commit(&self) -> Result<(), DbError> {
        self.transactions.lock().unwrap().push("commit");
        Ok(())
    }

    fn roll_back(&self) -> Result<(), DbError> {
        self.transactions.lock().unwrap().push("rollback");
        Ok(())
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        self.last_error.lock().unwrap().clone()
    }

    fn last_insert_id(&self) -> Option<i64> {
        self.insert_id
    }

    fn list_table_names(&self, _database: &str) -> Result<Vec<String>, DbError> {
        self.table_listings.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.clone())
    }

    fn list_table_columns(&self, _table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        Ok(self.columns.clone())
    }

    fn list_table_indexes(&self, _table: &str) -> Result<Vec<IndexInfo>, DbError> {
        Ok(self.indexes.clone())
    }

    fn close(&self) {}
}

/// Map-backed cache store that counts hits and writes
#[derive(Default)]
pub struct MapCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    pub hits: AtomicUsize,
    pub writes: AtomicUsize,
}

impl IResultCache for MapCache {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        let found = self.entries.lock().unwrap().get(key).cloned();
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(found)
    }

    fn save(&self, key: &str, data: &[u8], _ttl: Duration) -> Result<(), DbError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "map"
    }
}

/// Cache store whose every operation fails
pub struct BrokenCache;

impl IResultCache for BrokenCache {
    fn fetch(&self, _key: &str) -> Result<Option<Vec<u8>>, DbError> {
        Err(DbError::Cache("unreachable".into()))
    }

    fn save(&self, _key: &str, _data: &[u8], _ttl: Duration) -> Result<(), DbError> {
        Err(DbError::Cache("unreachable".into()))
    }

    fn delete(&self, _key: &str) -> Result<(), DbError> {
        Err(DbError::Cache("unreachable".into()))
    }

    fn backend_name(&self) -> &'static str {
        "broken"
    }
}
