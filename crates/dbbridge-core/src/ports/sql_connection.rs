//! SQL backend port (driven/secondary port)
//!
//! The executor talks to the database exclusively through
//! [`ISqlConnection`]. Read queries come back as an [`INativeResult`], a
//! forward-only row source that the result cursor drains.
//!
//! ## Design Notes
//!
//! - All methods take `&self` and block until the backend answers; an
//!   adapter that wraps an async driver keeps its own runtime.
//! - Errors use [`DbError`] rather than `anyhow` so backend SQLSTATE/code/message
//!   triples reach the caller untouched.
//! - A connection is owned by one logical request; `Send + Sync` only allows
//!   handing it across threads, not concurrent use.

use std::fmt::{self, Display, Formatter};

use crate::domain::{ColumnInfo, DbError, ErrorInfo, IndexInfo, SqlValue};

/// SQL dialect family of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MySql,
    Sqlite,
}

impl Platform {
    /// Quotes an identifier, doubling embedded quote characters
    pub fn quote_identifier(&self, name: &str) -> String {
        let quote = match self {
            Platform::MySql => '`',
            Platform::Sqlite => '"',
        };
        // `schema.table` style names are quoted part by part
        name.split('.')
            .map(|part| {
                let escaped = part.replace(quote, &format!("{quote}{quote}"));
                format!("{quote}{escaped}{quote}")
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quotes a string literal
    pub fn quote(&self, value: &str) -> String {
        let escaped = match self {
            Platform::MySql => value.replace('\\', "\\\\").replace('\'', "''"),
            Platform::Sqlite => value.replace('\'', "''"),
        };
        format!("'{}'", escaped)
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Platform::MySql => write!(f, "mysql"),
            Platform::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Forward-only result of one executed query
///
/// Rows can be pulled exactly once, in order. Write statements produce a
/// result with no columns and no rows whose [`affected_rows`] is meaningful.
///
/// [`affected_rows`]: INativeResult::affected_rows
pub trait INativeResult: Send {
    /// Column names, known even when the result has no rows
    fn column_names(&self) -> &[String];

    /// Pulls the next row, `None` once the result is exhausted
    fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError>;

    /// Rows changed by a write statement
    fn affected_rows(&self) -> u64;

    /// Releases the native handle
    fn close(&mut self);

    /// Number of columns
    fn column_count(&self) -> usize {
        self.column_names().len()
    }
}

/// Port trait for an open database session
pub trait ISqlConnection: Send + Sync {
    /// Dialect family, drives identifier quoting and introspection
    fn platform(&self) -> Platform;

    /// Executes `sql` with positional `?` parameters
    ///
    /// On failure the adapter also records the error for [`error_info`].
    ///
    /// [`error_info`]: ISqlConnection::error_info
    fn execute_query(&self, sql: &str, params: &[SqlValue])
        -> Result<Box<dyn INativeResult>, DbError>;

    /// Quotes a string literal for direct inclusion in SQL
    fn quote(&self, value: &str) -> String {
        self.platform().quote(value)
    }

    /// Quotes an identifier (table or column name)
    fn quote_identifier(&self, name: &str) -> String {
        self.platform().quote_identifier(name)
    }

    fn begin_transaction(&self) -> Result<(), DbError>;

    fn commit(&self) -> Result<(), DbError>;

    fn roll_back(&self) -> Result<(), DbError>;

    /// Error triple of the last failed operation, if any
    fn error_info(&self) -> Option<ErrorInfo>;

    /// Id generated by the last insert, if the backend reported one
    fn last_insert_id(&self) -> Option<i64>;

    /// Names of the tables in `database`
    fn list_table_names(&self, database: &str) -> Result<Vec<String>, DbError>;

    /// Columns of `table` in table order
    fn list_table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError>;

    /// Indexes of `table`, including the primary key
    fn list_table_indexes(&self, table: &str) -> Result<Vec<IndexInfo>, DbError>;

    /// Closes the session; further calls fail with a backend error
    fn close(&self);
}
