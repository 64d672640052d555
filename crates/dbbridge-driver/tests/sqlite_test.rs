//! Integration tests against an in-memory SQLite database
//!
//! Every test connects through the `Connector` with its own `:memory:`
//! database, so tests are isolated from each other.

use std::sync::{Arc, Mutex};

use dbbridge_core::config::{ConfigBuilder, ConfigLayer, ConnectionParams, LayeredConfig};
use dbbridge_core::domain::{BindValue, DbError, IndexKind, LockMode, SqlValue};
use dbbridge_core::ports::{IPostConnectHook, IPreConnectHook, ISqlConnection};
use dbbridge_core::{Database, StatementState};
use dbbridge_driver::{Connector, SqlxConnection};

// ============================================================================
// Test helpers
// ============================================================================

const SCHEMA: &str = "CREATE TABLE tl_page (\
    id INTEGER PRIMARY KEY AUTOINCREMENT, \
    pid INTEGER NOT NULL DEFAULT 0, \
    title VARCHAR(255), \
    alias VARCHAR(128) NOT NULL DEFAULT '', \
    UNIQUE (alias))";

fn layers(cache_url: &str) -> LayeredConfig {
    let request = ConfigBuilder::new()
        .driver("sqlite")
        .database(":memory:")
        .cache_url(cache_url)
        .build();
    LayeredConfig::new(request, ConfigLayer::default())
}

/// Fresh database with the page table and three pages
fn setup(cache_url: &str) -> Database {
    let db = Connector::new()
        .connect_layered(&layers(cache_url))
        .expect("Failed to open in-memory database");
    db.query(SCHEMA).unwrap();

    for (title, alias) in [("Home", "home"), ("About", "about"), ("Contact", "contact")] {
        let mut stmt = db.prepare("INSERT INTO tl_page %s").unwrap();
        stmt.bind([("pid", BindValue::from(0)), ("title", title.into()), ("alias", alias.into())])
            .unwrap();
        stmt.execute(&[]).unwrap();
    }
    db
}

// ============================================================================
// Statement execution
// ============================================================================

#[test]
fn test_insert_bind_expands_columns_and_reports_outcome() {
    let db = setup("");
    let mut stmt = db.prepare("INSERT INTO tl_page %s").unwrap();
    stmt.bind([("title", "News"), ("alias", "news")]).unwrap();
    assert_eq!(
        stmt.query_string(),
        r#"INSERT INTO tl_page ("title", "alias") VALUES (?, ?)"#
    );

    let outcome = stmt.execute(&[]).unwrap().outcome().expect("write outcome");
    assert_eq!(outcome.affected_rows, 1);
    assert_eq!(outcome.last_insert_id, Some(4));
    assert_eq!(stmt.affected_rows().unwrap(), 1);
    assert_eq!(stmt.last_insert_id().unwrap(), Some(4));
    assert_eq!(stmt.state(), StatementState::Executed);
}

#[test]
fn test_update_bind_with_where_parameter() {
    let db = setup("");
    let mut stmt = db.prepare("UPDATE tl_page %s WHERE id=?").unwrap();
    stmt.bind([("title", "Start")]).unwrap();
    let outcome = stmt.execute(&[SqlValue::Int(1)]).unwrap().outcome().unwrap();
    assert_eq!(outcome.affected_rows, 1);

    let mut cursor = db
        .query("SELECT title FROM tl_page WHERE id=1")
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(cursor.fetch_field(0), Some(SqlValue::Text("Start".into())));
}

#[test]
fn test_null_binds_as_literal_marker() {
    let db = setup("");
    let mut stmt = db.prepare("UPDATE tl_page %s WHERE id=?").unwrap();
    stmt.bind([("title", BindValue::Null)]).unwrap();
    stmt.execute(&[SqlValue::Int(2)]).unwrap();

    let mut cursor = db
        .query("SELECT title FROM tl_page WHERE id=2")
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(cursor.fetch_field(0), Some(SqlValue::Text("NULL".into())));
}

#[test]
fn test_composite_values_are_serialized() {
    let db = setup("");
    let mut stmt = db.prepare("UPDATE tl_page %s WHERE id=?").unwrap();
    stmt.bind([("title", serde_json::json!(["a", "b"]))]).unwrap();
    stmt.execute(&[SqlValue::Int(3)]).unwrap();

    let mut cursor = db
        .query("SELECT title FROM tl_page WHERE id=3")
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(
        cursor.fetch_field(0),
        Some(SqlValue::Text(r#"["a","b"]"#.into()))
    );
}

#[test]
fn test_values_decode_by_storage_class() {
    let db = setup("");
    let mut cursor = db
        .query("SELECT 42 AS i, 1.5 AS f, 'text' AS t, x'0102' AS b, NULL AS n")
        .unwrap()
        .into_cursor()
        .unwrap();

    let row = cursor.fetch_assoc().unwrap();
    assert_eq!(row.get("i"), Some(&SqlValue::Int(42)));
    assert_eq!(row.get("f"), Some(&SqlValue::Float(1.5)));
    assert_eq!(row.get("t"), Some(&SqlValue::Text("text".into())));
    assert_eq!(row.get("b"), Some(&SqlValue::Bytes(vec![1, 2])));
    assert_eq!(row.get("n"), Some(&SqlValue::Null));
}

#[test]
fn test_backend_errors_are_reported_verbatim() {
    let db = setup("");
    let mut stmt = db.prepare("SELECT * FROM missing").unwrap();
    let err = stmt.execute(&[]).unwrap_err();

    let info = err.error_info().expect("backend error").clone();
    assert_eq!(info.state, "HY000");
    assert!(info.message.contains("no such table"), "{}", info.message);
    assert_eq!(stmt.last_error().unwrap(), Some(&info));
    assert!(db.error().starts_with("SQLSTATE HY000: error"));
}

#[test]
fn test_accessors_fail_before_execution() {
    let db = setup("");
    let stmt = db.prepare("SELECT * FROM tl_page").unwrap();
    assert!(matches!(stmt.affected_rows(), Err(DbError::NotExecuted)));
    assert!(matches!(stmt.last_insert_id(), Err(DbError::NotExecuted)));
}

// ============================================================================
// Cursor
// ============================================================================

#[test]
fn test_cursor_seeks_over_real_rows() {
    let db = setup("");
    let mut cursor = db
        .query("SELECT id, title FROM tl_page ORDER BY id")
        .unwrap()
        .into_cursor()
        .unwrap();

    assert_eq!(cursor.row_count(), 3);
    assert_eq!(cursor.column_names(), &["id".to_string(), "title".to_string()]);

    cursor.data_seek(2).unwrap();
    assert_eq!(cursor.fetch_row().unwrap()[1], SqlValue::Text("Contact".into()));
    assert!(cursor.fetch_row().is_none());

    cursor.data_seek(0).unwrap();
    assert_eq!(cursor.fetch_assoc().unwrap().get("title"), Some(&SqlValue::Text("Home".into())));

    assert!(matches!(
        cursor.data_seek(3),
        Err(DbError::OutOfBounds { index: 3, row_count: 3 })
    ));
    assert!(cursor.data_seek(-1).is_err());
    assert_eq!(cursor.row_count(), 3);
}

#[test]
fn test_empty_result_keeps_columns() {
    let db = setup("");
    let mut cursor = db
        .query("SELECT id, title FROM tl_page WHERE id > 100")
        .unwrap()
        .into_cursor()
        .unwrap();

    assert_eq!(cursor.row_count(), 0);
    assert_eq!(cursor.column_count(), 2);
    assert!(cursor.fetch_assoc().is_none());
    cursor.data_seek(5).unwrap();
}

// ============================================================================
// Query cache
// ============================================================================

#[test]
fn test_cached_reads_replay_until_bypassed() {
    let db = setup("array://");
    let sql = "SELECT COUNT(*) AS total FROM tl_page";

    let first = db.query(sql).unwrap().into_cursor().unwrap();
    assert!(!first.is_from_cache());

    db.query("DELETE FROM tl_page WHERE id = 3").unwrap();

    let mut cached = db.query(sql).unwrap().into_cursor().unwrap();
    assert!(cached.is_from_cache());
    assert_eq!(cached.fetch_field(0), Some(SqlValue::Int(3)));

    let mut fresh = db.query_uncached(sql).unwrap().into_cursor().unwrap();
    assert!(!fresh.is_from_cache());
    assert_eq!(fresh.fetch_field(0), Some(SqlValue::Int(2)));
}

#[test]
fn test_cache_keys_include_parameters() {
    let db = setup("array://");
    let mut stmt = db.prepare("SELECT title FROM tl_page WHERE id=?").unwrap();
    let mut one = stmt.execute(&[SqlValue::Int(1)]).unwrap().into_cursor().unwrap();

    let mut stmt = db.prepare("SELECT title FROM tl_page WHERE id=?").unwrap();
    let mut two = stmt.execute(&[SqlValue::Int(2)]).unwrap().into_cursor().unwrap();

    assert!(!two.is_from_cache());
    assert_eq!(one.fetch_field(0), Some(SqlValue::Text("Home".into())));
    assert_eq!(two.fetch_field(0), Some(SqlValue::Text("About".into())));
}

#[test]
fn test_disabled_cache_always_executes() {
    let db = setup("");
    assert!(db.query_cache().is_none());
    db.query("SELECT 1").unwrap();
    let cursor = db.query("SELECT 1").unwrap().into_cursor().unwrap();
    assert!(!cursor.is_from_cache());
}

// ============================================================================
// Database facade
// ============================================================================

#[test]
fn test_list_tables_is_memoized() {
    let db = setup("");
    assert_eq!(db.list_tables(None, false).unwrap(), vec!["tl_page"]);

    db.query("CREATE TABLE tl_news (id INTEGER PRIMARY KEY)").unwrap();
    assert_eq!(db.list_tables(None, false).unwrap(), vec!["tl_page"]);
    assert_eq!(
        db.list_tables(None, true).unwrap(),
        vec!["tl_news", "tl_page"]
    );
}

#[test]
fn test_list_fields_describes_columns_and_indexes() {
    let db = setup("");
    db.query("CREATE INDEX pid_alias ON tl_page (pid, alias)").unwrap();

    let fields = db.list_fields("tl_page").unwrap();
    let by_name = |name: &str| {
        fields
            .iter()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("field {name}"))
    };

    let id = by_name("id");
    assert_eq!(id.index, IndexKind::Primary);
    assert_eq!(id.extra, "auto_increment");

    let alias = by_name("alias");
    assert_eq!(alias.index, IndexKind::Unique);
    assert_eq!(alias.field_type, "varchar");
    assert_eq!(alias.length, Some(128));
    assert!(!alias.nullable);

    assert_eq!(by_name("pid").index, IndexKind::None);
    assert!(by_name("title").nullable);

    let composite = by_name("pid_alias");
    assert!(composite.is_index_row());
    assert_eq!(composite.index, IndexKind::Key);
    assert_eq!(composite.index_fields, vec!["pid", "alias"]);
}

#[test]
fn test_transactions_commit_and_roll_back() {
    let db = setup("");

    db.begin_transaction().unwrap();
    db.query("DELETE FROM tl_page").unwrap();
    db.rollback_transaction().unwrap();

    db.begin_transaction().unwrap();
    db.query("DELETE FROM tl_page WHERE id = 1").unwrap();
    db.commit_transaction().unwrap();

    let mut cursor = db
        .query_uncached("SELECT COUNT(*) FROM tl_page")
        .unwrap()
        .into_cursor()
        .unwrap();
    assert_eq!(cursor.fetch_field(0), Some(SqlValue::Int(2)));
}

#[test]
fn test_mysql_only_statements_fail_on_sqlite() {
    let db = setup("");
    assert!(matches!(db.size_of("tl_page"), Err(DbError::Backend(_))));
    assert!(matches!(
        db.lock_tables(&[("tl_page", LockMode::Write)]),
        Err(DbError::Backend(_))
    ));
}

#[test]
fn test_find_in_set_uses_sqlite_quoting() {
    let db = setup("");
    assert_eq!(
        db.find_in_set("groups", "1,2", false),
        r#"FIND_IN_SET("groups", '1,2')"#
    );
}

#[test]
fn test_disconnect_closes_the_connection() {
    let db = setup("");
    db.disconnect();
    assert_eq!(db.error(), "connection not available");
    assert!(matches!(db.query("SELECT 1"), Err(DbError::Backend(_))));
}

// ============================================================================
// Connector
// ============================================================================

#[test]
fn test_unknown_driver_fails_before_connecting() {
    let request = ConfigBuilder::new().driver("oracle").build();
    let err = Connector::new()
        .connect_layered(&LayeredConfig::new(request, ConfigLayer::default()))
        .unwrap_err();
    assert!(matches!(err, DbError::Configuration(_)));
}

struct UseMemoryDatabase {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl IPreConnectHook for UseMemoryDatabase {
    fn before_connect(&self, params: &mut ConnectionParams) -> Result<(), DbError> {
        self.calls.lock().unwrap().push("pre");
        params.database = ":memory:".to_string();
        Ok(())
    }
}

struct CreateSchema {
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl IPostConnectHook for CreateSchema {
    fn after_connect(
        &self,
        params: &ConnectionParams,
        connection: &dyn ISqlConnection,
    ) -> Result<(), DbError> {
        self.calls.lock().unwrap().push("post");
        assert_eq!(params.database, ":memory:");
        connection.execute_query(SCHEMA, &[])?;
        Ok(())
    }
}

#[test]
fn test_hooks_run_in_order_and_see_rewritten_params() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let request = ConfigBuilder::new()
        .driver("sqlite")
        .database("replaced-by-hook")
        .build();

    let db = Connector::new()
        .pre_connect(Arc::new(UseMemoryDatabase {
            calls: Arc::clone(&calls),
        }))
        .post_connect(Arc::new(CreateSchema {
            calls: Arc::clone(&calls),
        }))
        .connect_layered(&LayeredConfig::new(request, ConfigLayer::default()))
        .unwrap();

    assert_eq!(*calls.lock().unwrap(), vec!["pre", "post"]);
    assert_eq!(db.database_name(), ":memory:");
    assert_eq!(db.list_tables(None, false).unwrap(), vec!["tl_page"]);
}

struct Refuse;

impl IPreConnectHook for Refuse {
    fn before_connect(&self, _params: &mut ConnectionParams) -> Result<(), DbError> {
        Err(DbError::Configuration("maintenance mode".into()))
    }
}

#[test]
fn test_failing_hook_aborts_connect() {
    let err = Connector::new()
        .pre_connect(Arc::new(Refuse))
        .connect_layered(&layers(""))
        .unwrap_err();
    assert_eq!(err, DbError::Configuration("maintenance mode".into()));
}

#[test]
fn test_unreachable_cache_degrades_to_uncached() {
    let db = Connector::new()
        .connect_layered(&layers("redis://127.0.0.1:1"))
        .unwrap();
    assert!(db.query_cache().is_none());
    db.query("SELECT 1").unwrap();
}

#[test]
fn test_file_database_persists_between_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("site.db");
    let request = ConfigBuilder::new()
        .driver("sqlite")
        .database(path.to_string_lossy())
        .build();
    let layered = LayeredConfig::new(request, ConfigLayer::default());

    let db = Connector::new().connect_layered(&layered).unwrap();
    db.query(SCHEMA).unwrap();
    db.disconnect();

    let db = Connector::new().connect_layered(&layered).unwrap();
    assert_eq!(db.list_tables(None, false).unwrap(), vec!["tl_page"]);
}

#[test]
fn test_raw_connection_reports_last_error() {
    let conn = SqlxConnection::in_memory().unwrap();
    assert!(conn.error_info().is_none());
    assert!(conn.execute_query("NOT SQL", &[]).is_err());
    assert!(conn.error_info().is_some());
    conn.execute_query("SELECT 1", &[]).unwrap();
    assert!(conn.error_info().is_none());
}
