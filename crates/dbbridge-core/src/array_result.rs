//! Forward-only result over rows that are already in memory
//!
//! Used by adapters whose driver hands back whole result sets, and to replay
//! results out of the query cache.

use std::collections::VecDeque;

use crate::domain::{CachedResult, DbError, SqlValue};
use crate::ports::INativeResult;

/// An [`INativeResult`] backed by a row buffer
#[derive(Debug, Default)]
pub struct ArrayResult {
    columns: Vec<String>,
    rows: VecDeque<Vec<SqlValue>>,
    affected_rows: u64,
}

impl ArrayResult {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            columns,
            rows: rows.into(),
            affected_rows: 0,
        }
    }

    /// Result of a write statement: no columns, no rows
    pub fn written(affected_rows: u64) -> Self {
        Self {
            affected_rows,
            ..Self::default()
        }
    }
}

impl From<CachedResult> for ArrayResult {
    fn from(cached: CachedResult) -> Self {
        Self::new(cached.columns, cached.rows)
    }
}

impl INativeResult for ArrayResult {
    fn column_names(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
        Ok(self.rows.pop_front())
    }

    fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    fn close(&mut self) {
        self.rows.clear();
    }
}
