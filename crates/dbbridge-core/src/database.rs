//! Database facade
//!
//! [`Database`] is what callers hold once a connection is established: it
//! hands out [`Statement`]s that share the connection and the query cache,
//! and offers the schema and maintenance helpers the legacy database layer
//! expects (table lists, field descriptors, table locks, table status).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::domain::{describe_fields, DbError, FieldDescriptor, LockMode, Row, SqlValue};
use crate::ports::{ISqlConnection, IValueCodec};
use crate::query_cache::QueryCache;
use crate::statement::{ExecuteResult, Statement};

/// A live connection with its query cache and schema memo
pub struct Database {
    connection: Arc<dyn ISqlConnection>,
    codec: Arc<dyn IValueCodec>,
    query_cache: Option<QueryCache>,
    database: String,
    table_memo: Mutex<HashMap<String, Vec<String>>>,
    disconnected: AtomicBool,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("platform", &self.connection.platform())
            .field("database", &self.database)
            .field("query_cache", &self.query_cache)
            .finish()
    }
}

impl Database {
    /// `database` is the default schema name used by [`list_tables`](Self::list_tables)
    pub fn new(
        connection: Arc<dyn ISqlConnection>,
        codec: Arc<dyn IValueCodec>,
        query_cache: Option<QueryCache>,
        database: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            codec,
            query_cache,
            database: database.into(),
            table_memo: Mutex::new(HashMap::new()),
            disconnected: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &Arc<dyn ISqlConnection> {
        &self.connection
    }

    pub fn query_cache(&self) -> Option<&QueryCache> {
        self.query_cache.as_ref()
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// A fresh statement over this connection, carrying the query cache
    pub fn statement(&self) -> Statement {
        let mut stmt = Statement::new(Arc::clone(&self.connection), Arc::clone(&self.codec));
        stmt.set_query_cache(self.query_cache.clone());
        stmt
    }

    /// Prepares `template` on a fresh statement
    ///
    /// # Errors
    ///
    /// [`DbError::EmptyQuery`] when `template` is blank.
    pub fn prepare(&self, template: &str) -> Result<Statement, DbError> {
        let mut stmt = self.statement();
        stmt.prepare(template)?;
        Ok(stmt)
    }

    /// Prepares and executes `sql` without parameters
    pub fn query(&self, sql: &str) -> Result<ExecuteResult, DbError> {
        self.prepare(sql)?.execute(&[])
    }

    /// Like [`query`](Self::query) but never touches the query cache
    pub fn query_uncached(&self, sql: &str) -> Result<ExecuteResult, DbError> {
        self.prepare(sql)?.execute_uncached(&[])
    }

    // -----------------------------------------------------------------------
    // Schema
    // -----------------------------------------------------------------------

    /// Table names of `database`, or of the connected database when `None`
    ///
    /// Results are memoized per database name; `no_cache` forces a fresh
    /// listing and replaces the memo.
    pub fn list_tables(
        &self,
        database: Option<&str>,
        no_cache: bool,
    ) -> Result<Vec<String>, DbError> {
        let database = database.unwrap_or(&self.database);

        if !no_cache {
            if let Some(tables) = self.memo().get(database) {
                return Ok(tables.clone());
            }
        }

        let tables = self.connection.list_table_names(database)?;
        tracing::debug!(database, tables = tables.len(), "Listed tables");
        self.memo().insert(database.to_string(), tables.clone());
        Ok(tables)
    }

    /// True when `table` exists in the connected database
    pub fn table_exists(&self, table: &str, no_cache: bool) -> Result<bool, DbError> {
        Ok(self.list_tables(None, no_cache)?.iter().any(|t| t == table))
    }

    fn memo(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<String>>> {
        self.table_memo
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Column descriptors of `table` in the legacy field-list shape
    pub fn list_fields(&self, table: &str) -> Result<Vec<FieldDescriptor>, DbError> {
        let columns = self.connection.list_table_columns(table)?;
        let indexes = self.connection.list_table_indexes(table)?;
        Ok(describe_fields(&columns, &indexes))
    }

    /// Names of the columns of `table`, without index pseudo-rows
    pub fn field_names(&self, table: &str) -> Result<Vec<String>, DbError> {
        Ok(self
            .list_fields(table)?
            .into_iter()
            .filter(|f| !f.is_index_row())
            .map(|f| f.name)
            .collect())
    }

    // -----------------------------------------------------------------------
    // Table maintenance
    // -----------------------------------------------------------------------

    /// Issues one `LOCK TABLES` statement for every `(table, mode)` pair
    ///
    /// Locks are held until [`unlock_tables`](Self::unlock_tables).
    pub fn lock_tables(&self, tables: &[(&str, LockMode)]) -> Result<(), DbError> {
        let locks: Vec<String> = tables
            .iter()
            .map(|(table, mode)| {
                format!("{} {}", self.connection.quote_identifier(table), mode.as_sql())
            })
            .collect();
        self.exec(&format!("LOCK TABLES {};", locks.join(", ")))
    }

    pub fn unlock_tables(&self) -> Result<(), DbError> {
        self.exec("UNLOCK TABLES;")
    }

    /// Data plus index size of `table` in bytes; 0 for unknown tables
    pub fn size_of(&self, table: &str) -> Result<u64, DbError> {
        let Some(status) = self.table_status(table)? else {
            return Ok(0);
        };
        let size = ["Data_length", "Index_length"]
            .iter()
            .filter_map(|column| status.get(column).and_then(SqlValue::as_i64))
            .sum::<i64>();
        Ok(u64::try_from(size).unwrap_or(0))
    }

    /// Next auto-increment value of `table`
    pub fn next_id(&self, table: &str) -> Result<Option<i64>, DbError> {
        Ok(self
            .table_status(table)?
            .and_then(|status| status.get("Auto_increment").and_then(SqlValue::as_i64)))
    }

    fn table_status(&self, table: &str) -> Result<Option<Row>, DbError> {
        let sql = format!("SHOW TABLE STATUS LIKE {}", self.connection.quote(table));
        let result = self.query_uncached(&sql)?;
        Ok(result.into_cursor().and_then(|mut cursor| cursor.fetch_assoc()))
    }

    fn exec(&self, sql: &str) -> Result<(), DbError> {
        let mut native = self.connection.execute_query(sql, &[])?;
        native.close();
        tracing::debug!(query = sql, "Executed statement");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transactions
    // -----------------------------------------------------------------------

    pub fn begin_transaction(&self) -> Result<(), DbError> {
        self.connection.begin_transaction()
    }

    pub fn commit_transaction(&self) -> Result<(), DbError> {
        self.connection.commit()
    }

    pub fn rollback_transaction(&self) -> Result<(), DbError> {
        self.connection.roll_back()
    }

    // -----------------------------------------------------------------------
    // Misc
    // -----------------------------------------------------------------------

    /// SQL fragment testing membership of `key` in a comma separated set
    ///
    /// `key` is quoted as an identifier. `set` is inserted as is when
    /// `is_field` is true, otherwise quoted as a string literal.
    pub fn find_in_set(&self, key: &str, set: &str, is_field: bool) -> String {
        let set = if is_field {
            set.to_string()
        } else {
            self.connection.quote(set)
        };
        format!(
            "FIND_IN_SET({}, {})",
            self.connection.quote_identifier(key),
            set
        )
    }

    /// Quotes a string literal through the connection
    pub fn escape(&self, value: &str) -> String {
        self.connection.quote(value)
    }

    /// Legacy error text of the last backend error; empty when there is none
    pub fn error(&self) -> String {
        if self.disconnected.load(Ordering::SeqCst) {
            return "connection not available".to_string();
        }
        self.connection
            .error_info()
            .map(|info| info.to_string())
            .unwrap_or_default()
    }

    /// Switching databases on a live connection is not supported
    ///
    /// # Errors
    ///
    /// Always [`DbError::Unimplemented`].
    pub fn set_database(&self, _name: &str) -> Result<(), DbError> {
        Err(DbError::Unimplemented("set_database".to_string()))
    }

    /// Closes the connection; later calls fail at the backend
    pub fn disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::SeqCst) {
            self.connection.close();
            tracing::info!(database = %self.database, "Disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        !self.disconnected.load(Ordering::SeqCst)
    }
}
