//! Blocking SQL connection on top of sqlx
//!
//! [`SqlxConnection`] implements the synchronous [`ISqlConnection`] port.
//! It owns a single sqlx connection (MySQL or SQLite) together with a
//! current-thread tokio runtime and blocks on that runtime for every call,
//! so callers never see a future.
//!
//! Calling into a `SqlxConnection` from inside another tokio runtime panics;
//! use `spawn_blocking` there.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use dbbridge_core::array_result::ArrayResult;
use dbbridge_core::config::{ConnectionParams, Driver};
use dbbridge_core::domain::{ColumnInfo, DbError, ErrorInfo, IndexInfo, SqlValue};
use dbbridge_core::ports::{INativeResult, ISqlConnection, Platform};
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Column, ConnectOptions, Connection, Executor};
use tokio::runtime::Runtime;
use url::Url;

use crate::decode::{self, bind_params};
use crate::error::{backend_error, error_info};
use crate::schema;

/// SQLite busy timeout, matching the behaviour of a shared database file
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// The live driver session
enum Session {
    MySql(MySqlConnection),
    Sqlite(SqliteConnection),
}

/// Everything one statement produced
#[derive(Debug, Default)]
pub(crate) struct Fetched {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub affected_rows: u64,
    pub last_insert_id: Option<i64>,
}

/// A blocking MySQL or SQLite connection
pub struct SqlxConnection {
    runtime: Runtime,
    session: Mutex<Option<Session>>,
    platform: Platform,
    last_error: Mutex<Option<ErrorInfo>>,
    last_insert_id: Mutex<Option<i64>>,
}

impl std::fmt::Debug for SqlxConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxConnection")
            .field("platform", &self.platform)
            .finish()
    }
}

impl SqlxConnection {
    /// Opens a connection described by `params`
    ///
    /// For MySQL a configured socket wins over host and port. For SQLite the
    /// database name is the file path (created when missing, parent
    /// directories included) or `:memory:`. Driver options become URL
    /// parameters on MySQL and `PRAGMA`s on SQLite.
    ///
    /// # Errors
    ///
    /// [`DbError::Backend`] when the server refuses the connection,
    /// [`DbError::Configuration`] for unusable parameters.
    pub fn open(params: &ConnectionParams) -> Result<Self, DbError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DbError::Configuration(format!("Failed to start runtime: {}", e)))?;

        let session = match params.driver {
            Driver::MySql => {
                let options = mysql_options(params)?;
                let conn = runtime
                    .block_on(options.connect())
                    .map_err(|e| backend_error(&e))?;
                Session::MySql(conn)
            }
            Driver::Sqlite => {
                let options = sqlite_options(&params.database)?;
                let mut conn = runtime
                    .block_on(options.connect())
                    .map_err(|e| backend_error(&e))?;
                for (key, value) in &params.driver_options {
                    let pragma = format!("PRAGMA {} = {}", key, value);
                    runtime
                        .block_on((&mut conn).execute(pragma.as_str()))
                        .map_err(|e| backend_error(&e))?;
                }
                Session::Sqlite(conn)
            }
        };

        let platform = match params.driver {
            Driver::MySql => Platform::MySql,
            Driver::Sqlite => Platform::Sqlite,
        };

        tracing::info!(
            driver = %params.driver,
            host = %params.host,
            database = %params.database,
            "Database connection established"
        );

        Ok(Self {
            runtime,
            session: Mutex::new(Some(session)),
            platform,
            last_error: Mutex::new(None),
            last_insert_id: Mutex::new(None),
        })
    }

    /// Opens a private in-memory SQLite database
    pub fn in_memory() -> Result<Self, DbError> {
        Self::open(&ConnectionParams {
            driver: Driver::Sqlite,
            host: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
            database: ":memory:".to_string(),
            charset: String::new(),
            socket: None,
            driver_options: Default::default(),
        })
    }

    fn session(&self) -> MutexGuard<'_, Option<Session>> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record_error(&self, info: Option<ErrorInfo>) {
        *self
            .last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = info;
    }

    /// Runs `sql` and collects everything it produced
    ///
    /// Parameterless statements go over the plain text protocol, so
    /// statements MySQL cannot prepare (`LOCK TABLES`) still work.
    pub(crate) fn run(&self, sql: &str, params: &[SqlValue]) -> Result<Fetched, DbError> {
        let mut guard = self.session();
        let session = guard
            .as_mut()
            .ok_or_else(|| DbError::Backend(ErrorInfo::general("connection not available")))?;

        let returns_rows = schema::returns_rows(sql);
        let result = self.runtime.block_on(async {
            match session {
                Session::MySql(conn) => run_mysql(conn, sql, params, returns_rows).await,
                Session::Sqlite(conn) => run_sqlite(conn, sql, params, returns_rows).await,
            }
        });

        match result {
            Ok(fetched) => {
                self.record_error(None);
                if fetched.last_insert_id.is_some() {
                    *self
                        .last_insert_id
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner()) = fetched.last_insert_id;
                }
                Ok(fetched)
            }
            Err(e) => {
                let info = error_info(&e);
                tracing::debug!(query = sql, error = %info, "Statement failed");
                self.record_error(Some(info.clone()));
                Err(DbError::Backend(info))
            }
        }
    }

    fn exec(&self, sql: &str) -> Result<(), DbError> {
        self.run(sql, &[]).map(|_| ())
    }
}

fn mysql_options(params: &ConnectionParams) -> Result<MySqlConnectOptions, DbError> {
    let invalid = |what: &str| DbError::Configuration(format!("Invalid MySQL {}", what));

    // A socket connection still needs some host in the URL
    let host = if params.host.trim().is_empty() {
        "localhost"
    } else {
        params.host.as_str()
    };

    let mut url = Url::parse("mysql://localhost").map_err(|_| invalid("url"))?;
    url.set_host(Some(host)).map_err(|_| invalid("host"))?;
    url.set_port(Some(params.port)).map_err(|_| invalid("port"))?;
    url.set_username(&params.user).map_err(|_| invalid("user"))?;
    if !params.password.is_empty() {
        url.set_password(Some(&params.password))
            .map_err(|_| invalid("password"))?;
    }
    url.set_path(&params.database);
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("charset", &params.charset);
        if let Some(socket) = &params.socket {
            query.append_pair("socket", &socket.to_string_lossy());
        }
        for (key, value) in &params.driver_options {
            query.append_pair(key, value);
        }
    }

    MySqlConnectOptions::from_url(&url)
        .map_err(|e| DbError::Configuration(format!("Invalid MySQL options: {}", e)))
}

fn sqlite_options(database: &str) -> Result<SqliteConnectOptions, DbError> {
    if database == ":memory:" {
        return SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::Configuration(format!("Invalid SQLite options: {}", e)));
    }

    let path = Path::new(database);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbError::Configuration(format!(
                "Failed to create database directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    Ok(SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .busy_timeout(SQLITE_BUSY_TIMEOUT))
}

async fn run_mysql(
    conn: &mut MySqlConnection,
    sql: &str,
    params: &[SqlValue],
    returns_rows: bool,
) -> Result<Fetched, sqlx::Error> {
    if returns_rows {
        let rows = if params.is_empty() {
            (&mut *conn).fetch_all(sql).await?
        } else {
            bind_params!(sqlx::query(sql), params)
                .fetch_all(&mut *conn)
                .await?
        };

        let columns = match rows.first() {
            Some(row) => decode::column_names(row),
            None => describe_columns((&mut *conn).describe(sql).await),
        };
        let rows = rows
            .iter()
            .map(decode::mysql_row)
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(Fetched {
            columns,
            rows,
            ..Fetched::default()
        });
    }

    let done = if params.is_empty() {
        (&mut *conn).execute(sql).await?
    } else {
        bind_params!(sqlx::query(sql), params)
            .execute(&mut *conn)
            .await?
    };

    Ok(Fetched {
        affected_rows: done.rows_affected(),
        last_insert_id: i64::try_from(done.last_insert_id())
            .ok()
            .filter(|id| *id > 0),
        ..Fetched::default()
    })
}

async fn run_sqlite(
    conn: &mut SqliteConnection,
    sql: &str,
    params: &[SqlValue],
    returns_rows: bool,
) -> Result<Fetched, sqlx::Error> {
    if returns_rows {
        let rows = bind_params!(sqlx::query(sql), params)
            .fetch_all(&mut *conn)
            .await?;

        let columns = match rows.first() {
            Some(row) => decode::column_names(row),
            None => describe_columns((&mut *conn).describe(sql).await),
        };
        let rows = rows
            .iter()
            .map(decode::sqlite_row)
            .collect::<Result<Vec<_>, _>>()?;

        return Ok(Fetched {
            columns,
            rows,
            ..Fetched::default()
        });
    }

    let done = if params.is_empty() {
        (&mut *conn).execute(sql).await?
    } else {
        bind_params!(sqlx::query(sql), params)
            .execute(&mut *conn)
            .await?
    };

    Ok(Fetched {
        affected_rows: done.rows_affected(),
        last_insert_id: Some(done.last_insert_rowid()).filter(|id| *id > 0),
        ..Fetched::default()
    })
}

/// Column names of a statement that returned no rows
///
/// Statements the server cannot describe report no columns.
fn describe_columns<DB: sqlx::Database>(
    described: Result<sqlx::Describe<DB>, sqlx::Error>,
) -> Vec<String> {
    match described {
        Ok(describe) => describe
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        Err(e) => {
            tracing::debug!(error = %e, "Could not describe empty result");
            Vec::new()
        }
    }
}

impl ISqlConnection for SqlxConnection {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn execute_query(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> Result<Box<dyn INativeResult>, DbError> {
        let fetched = self.run(sql, params)?;
        let result = if fetched.columns.is_empty() && fetched.rows.is_empty() {
            ArrayResult::written(fetched.affected_rows)
        } else {
            ArrayResult::new(fetched.columns, fetched.rows)
        };
        Ok(Box::new(result))
    }

    fn begin_transaction(&self) -> Result<(), DbError> {
        match self.platform {
            Platform::MySql => self.exec("START TRANSACTION"),
            Platform::Sqlite => self.exec("BEGIN"),
        }
    }

    fn commit(&self) -> Result<(), DbError> {
        self.exec("COMMIT")
    }

    fn roll_back(&self) -> Result<(), DbError> {
        self.exec("ROLLBACK")
    }

    fn error_info(&self) -> Option<ErrorInfo> {
        self.last_error
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn last_insert_id(&self) -> Option<i64> {
        *self
            .last_insert_id
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn list_table_names(&self, database: &str) -> Result<Vec<String>, DbError> {
        schema::table_names(self, database)
    }

    fn list_table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
        schema::table_columns(self, table)
    }

    fn list_table_indexes(&self, table: &str) -> Result<Vec<IndexInfo>, DbError> {
        schema::table_indexes(self, table)
    }

    fn close(&self) {
        let Some(session) = self.session().take() else {
            return;
        };
        let closed = self.runtime.block_on(async {
            match session {
                Session::MySql(conn) => conn.close().await,
                Session::Sqlite(conn) => conn.close().await,
            }
        });
        if let Err(e) = closed {
            tracing::warn!(error = %e, "Error while closing database connection");
        }
    }
}
