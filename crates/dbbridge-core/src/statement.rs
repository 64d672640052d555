//! Cached statement executor
//!
//! A [`Statement`] holds a query template, the parameters bound to it so far
//! and an optional [`QueryCache`]. Its lifecycle is
//! `Unprepared -> Prepared -> Bound -> Executed`; a new [`prepare`] starts
//! over, while calling [`execute`] again re-runs the query with every
//! parameter accumulated so far, like a reusable prepared statement.
//!
//! ## Caching
//!
//! Only read statements (`SELECT` / `SHOW` prefix) are cache candidates, and
//! only when a query cache is attached whose profile is not disabled. A hit
//! replays the stored rows without touching the backend; a miss executes,
//! materializes the rows and stores them before returning. Cache store
//! failures are logged and never fail the query.
//!
//! [`prepare`]: Statement::prepare
//! [`execute`]: Statement::execute

use std::sync::Arc;

use crate::array_result::ArrayResult;
use crate::cursor::ResultCursor;
use crate::domain::{BindValue, DbError, ErrorInfo, Row, SqlValue, NULL_MARKER};
use crate::ports::{ISqlConnection, IValueCodec};
use crate::query_cache::QueryCache;
use crate::sql::{is_read_statement, starts_with_keyword};

/// Placeholder in a template that `bind` expands into the column clause
pub const BIND_SLOT: &str = "%s";

/// Lifecycle state of a [`Statement`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementState {
    Unprepared,
    Prepared,
    Bound,
    Executed,
}

/// Outcome of a write (non-read) statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOutcome {
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
}

/// What `execute` hands back
#[derive(Debug)]
pub enum ExecuteResult {
    /// Read statement: a new cursor over its rows
    Rows(ResultCursor),
    /// Any other statement
    Written(WriteOutcome),
}

impl ExecuteResult {
    /// The cursor of a read statement
    pub fn into_cursor(self) -> Option<ResultCursor> {
        match self {
            ExecuteResult::Rows(cursor) => Some(cursor),
            ExecuteResult::Written(_) => None,
        }
    }

    /// The outcome of a write statement
    pub fn outcome(&self) -> Option<WriteOutcome> {
        match self {
            ExecuteResult::Rows(_) => None,
            ExecuteResult::Written(outcome) => Some(*outcome),
        }
    }
}

/// Where an execution's rows came from, for logging
#[derive(Debug, Clone, Copy)]
enum CacheUse {
    Hit,
    Miss,
    Bypass,
}

impl CacheUse {
    fn as_str(&self) -> &'static str {
        match self {
            CacheUse::Hit => "hit",
            CacheUse::Miss => "miss",
            CacheUse::Bypass => "bypass",
        }
    }
}

/// A reusable query template with bound parameters and an optional cache
pub struct Statement {
    connection: Arc<dyn ISqlConnection>,
    codec: Arc<dyn IValueCodec>,
    query_cache: Option<QueryCache>,
    query: String,
    parameters: Vec<SqlValue>,
    state: StatementState,
    /// Set by the first execution after `prepare`; later binds keep it
    executed: bool,
    last_outcome: Option<WriteOutcome>,
    last_error: Option<ErrorInfo>,
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query)
            .field("parameters", &self.parameters)
            .field("state", &self.state)
            .field("query_cache", &self.query_cache)
            .finish()
    }
}

impl Statement {
    pub fn new(connection: Arc<dyn ISqlConnection>, codec: Arc<dyn IValueCodec>) -> Self {
        Self {
            connection,
            codec,
            query_cache: None,
            query: String::new(),
            parameters: Vec::new(),
            state: StatementState::Unprepared,
            executed: false,
            last_outcome: None,
            last_error: None,
        }
    }

    /// Attaches (or with `None`, detaches) a query cache
    pub fn set_query_cache(&mut self, query_cache: Option<QueryCache>) -> &mut Self {
        self.query_cache = query_cache;
        self
    }

    pub fn query_cache(&self) -> Option<&QueryCache> {
        self.query_cache.as_ref()
    }

    /// Stores a new query template and clears bound parameters and results
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] when `template` is blank.
    pub fn prepare(&mut self, template: &str) -> Result<&mut Self, DbError> {
        if template.trim().is_empty() {
            return Err(DbError::EmptyQuery);
        }

        self.query = template.trim_start().to_string();
        self.parameters.clear();
        self.last_outcome = None;
        self.last_error = None;
        self.executed = false;
        self.state = StatementState::Prepared;
        Ok(self)
    }

    /// Binds column/value pairs, in iteration order
    ///
    /// Each value is normalized and appended to the parameters. For `INSERT`
    /// templates the `%s` slot becomes `(col1, col2) VALUES (?, ?)`, for
    /// `UPDATE` templates `SET col1=?, col2=?`; any other template has the
    /// slot removed. Column names are quoted by the connection.
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] before `prepare`; codec errors for composite values.
    pub fn bind<I, K, V>(&mut self, values: I) -> Result<&mut Self, DbError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<BindValue>,
    {
        if self.query.is_empty() {
            return Err(DbError::EmptyQuery);
        }

        let mut columns = Vec::new();
        for (key, value) in values {
            columns.push(self.connection.quote_identifier(key.as_ref()));
            let value = self.normalize(value.into())?;
            self.parameters.push(value);
        }

        let clause = if starts_with_keyword(&self.query, "INSERT") {
            format!(
                "({}) VALUES ({})",
                columns.join(", "),
                vec!["?"; columns.len()].join(", ")
            )
        } else if starts_with_keyword(&self.query, "UPDATE") {
            let assignments: Vec<String> = columns.iter().map(|c| format!("{}=?", c)).collect();
            format!("SET {}", assignments.join(", "))
        } else {
            String::new()
        };

        self.query = self.query.replace(BIND_SLOT, &clause);
        self.state = StatementState::Bound;
        Ok(self)
    }

    fn normalize(&self, value: BindValue) -> Result<SqlValue, DbError> {
        Ok(match value {
            BindValue::Null => SqlValue::Text(NULL_MARKER.to_string()),
            BindValue::Bool(b) => SqlValue::Int(i64::from(b)),
            BindValue::Int(i) => SqlValue::Int(i),
            BindValue::Float(f) => SqlValue::Float(f),
            BindValue::Text(s) => SqlValue::Text(s),
            BindValue::Bytes(b) => SqlValue::Bytes(b),
            BindValue::Composite(v) => SqlValue::Text(self.codec.encode(&v)?),
        })
    }

    /// Appends a limit clause
    ///
    /// `SELECT` statements get `LIMIT offset,row_count`, others `LIMIT row_count`.
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] before `prepare`.
    pub fn limit(&mut self, row_count: u64, offset: u64) -> Result<&mut Self, DbError> {
        if self.query.is_empty() {
            return Err(DbError::EmptyQuery);
        }

        if starts_with_keyword(&self.query, "SELECT") {
            self.query.push_str(&format!(" LIMIT {},{}", offset, row_count));
        } else {
            self.query.push_str(&format!(" LIMIT {}", row_count));
        }
        Ok(self)
    }

    /// Executes with `params` appended after the bound parameters, using the
    /// query cache when one applies
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] before `prepare`; backend errors verbatim.
    pub fn execute(&mut self, params: &[SqlValue]) -> Result<ExecuteResult, DbError> {
        self.run(params, true)
    }

    /// Like [`execute`](Self::execute) but never reads or writes the cache
    pub fn execute_uncached(&mut self, params: &[SqlValue]) -> Result<ExecuteResult, DbError> {
        self.run(params, false)
    }

    /// Replaces the template when `sql` is non-blank, then executes
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] when both `sql` and the stored template are blank.
    pub fn query(&mut self, sql: &str) -> Result<ExecuteResult, DbError> {
        if !sql.trim().is_empty() {
            self.query = sql.trim_start().to_string();
        }
        if self.query.is_empty() {
            return Err(DbError::EmptyQuery);
        }
        self.execute(&[])
    }

    /// Runs `EXPLAIN` over the current query and parameters
    ///
    /// Returns the first diagnostic row, `None` when the backend reports none.
    pub fn explain(&self) -> Result<Option<Row>, DbError> {
        if self.query.is_empty() {
            return Err(DbError::EmptyQuery);
        }
        let sql = format!("EXPLAIN {}", self.query);
        let native = self.connection.execute_query(&sql, &self.parameters)?;
        let mut cursor = ResultCursor::from_native(native, sql)?;
        Ok(cursor.fetch_assoc())
    }

    /// Quotes a string literal through the connection
    pub fn escape(&self, value: &str) -> String {
        self.connection.quote(value)
    }

    fn run(&mut self, params: &[SqlValue], use_cache: bool) -> Result<ExecuteResult, DbError> {
        if self.query.is_empty() {
            return Err(DbError::EmptyQuery);
        }

        self.parameters.extend_from_slice(params);
        self.state = StatementState::Executed;
        self.executed = true;
        self.last_outcome = None;
        self.last_error = None;

        if !is_read_statement(&self.query) {
            return self.run_write();
        }

        let query_cache = if use_cache {
            self.query_cache.clone().filter(QueryCache::is_enabled)
        } else {
            None
        };

        let (cursor, cache_use) = match query_cache {
            Some(cache) => self.run_cached_read(&cache)?,
            None => (self.run_read()?, CacheUse::Bypass),
        };

        self.last_outcome = Some(WriteOutcome {
            affected_rows: cursor.row_count() as u64,
            last_insert_id: None,
        });

        tracing::debug!(
            query = %self.query,
            params = self.parameters.len(),
            rows = cursor.row_count(),
            cache = cache_use.as_str(),
            "Executed query"
        );

        Ok(ExecuteResult::Rows(cursor))
    }

    fn run_write(&mut self) -> Result<ExecuteResult, DbError> {
        let mut native = self.execute_native()?;
        let affected_rows = native.affected_rows();
        native.close();

        let outcome = WriteOutcome {
            affected_rows,
            last_insert_id: self.connection.last_insert_id(),
        };
        self.last_outcome = Some(outcome);

        tracing::debug!(
            query = %self.query,
            params = self.parameters.len(),
            affected_rows,
            "Executed statement"
        );

        Ok(ExecuteResult::Written(outcome))
    }

    fn run_read(&mut self) -> Result<ResultCursor, DbError> {
        let native = self.execute_native()?;
        ResultCursor::from_native(native, self.query.clone())
    }

    fn run_cached_read(&mut self, cache: &QueryCache) -> Result<(ResultCursor, CacheUse), DbError> {
        let key = match cache.cache_key(&self.query, &self.parameters) {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build cache key, executing uncached");
                return Ok((self.run_read()?, CacheUse::Bypass));
            }
        };

        match cache.fetch(&key) {
            Ok(Some(cached)) => {
                let replay = Box::new(ArrayResult::from(cached));
                let cursor = ResultCursor::drain(replay, self.query.clone(), true)?;
                return Ok((cursor, CacheUse::Hit));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(
                    backend = cache.store().backend_name(),
                    error = %e,
                    "Cache lookup failed, treating as miss"
                );
            }
        }

        let cursor = self.run_read()?;
        if let Err(e) = cache.save(&key, &cursor.to_cached()) {
            tracing::warn!(
                backend = cache.store().backend_name(),
                error = %e,
                "Failed to store query result in cache"
            );
        }

        Ok((cursor, CacheUse::Miss))
    }

    fn execute_native(&mut self) -> Result<Box<dyn crate::ports::INativeResult>, DbError> {
        self.connection
            .execute_query(&self.query, &self.parameters)
            .map_err(|e| {
                self.last_error = e
                    .error_info()
                    .cloned()
                    .or_else(|| self.connection.error_info());
                e
            })
    }

    /// Rows affected by the last write, or rows returned by the last read
    ///
    /// # Errors
    ///
    /// [`DbError::NotExecuted`] before the first execution.
    pub fn affected_rows(&self) -> Result<u64, DbError> {
        self.ensure_executed()?;
        Ok(self.last_outcome.map_or(0, |o| o.affected_rows))
    }

    /// Id generated by the last insert on this connection
    ///
    /// # Errors
    ///
    /// [`DbError::NotExecuted`] before the first execution.
    pub fn last_insert_id(&self) -> Result<Option<i64>, DbError> {
        self.ensure_executed()?;
        Ok(self.connection.last_insert_id())
    }

    /// Backend error of the last execution, `None` if it succeeded
    ///
    /// # Errors
    ///
    /// [`DbError::NotExecuted`] before the first execution.
    pub fn last_error(&self) -> Result<Option<&ErrorInfo>, DbError> {
        self.ensure_executed()?;
        Ok(self.last_error.as_ref())
    }

    fn ensure_executed(&self) -> Result<(), DbError> {
        if self.executed {
            Ok(())
        } else {
            Err(DbError::NotExecuted)
        }
    }

    /// Final query string as it will be sent to the backend
    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Parameters accumulated so far, in send order
    pub fn parameters(&self) -> &[SqlValue] {
        &self.parameters
    }

    pub fn state(&self) -> StatementState {
        self.state
    }
}
