//! Schema introspection
//!
//! MySQL is queried through `information_schema`; SQLite through
//! `sqlite_master` and the `table_info` / `index_list` / `index_info`
//! pragmas. Both are reduced to the port's [`ColumnInfo`] / [`IndexInfo`].

use std::sync::Arc;

use dbbridge_core::domain::{ColumnInfo, DbError, IndexInfo, Row, SqlValue};
use dbbridge_core::ports::{ISqlConnection, Platform};
use dbbridge_core::sql::starts_with_keyword;

use crate::connection::SqlxConnection;

/// Name the primary key gets when SQLite reports it only through `table_info`
const PRIMARY_INDEX_NAME: &str = "PRIMARY";

/// Leading keywords of statements that produce a result set
const ROW_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "EXPLAIN", "DESCRIBE", "DESC", "PRAGMA", "WITH", "VALUES",
];

/// True when `sql` yields rows rather than an affected-row count
pub(crate) fn returns_rows(sql: &str) -> bool {
    let sql = sql.trim_start();
    ROW_KEYWORDS.iter().any(|kw| starts_with_keyword(sql, kw))
}

fn rows(conn: &SqlxConnection, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>, DbError> {
    let fetched = conn.run(sql, params)?;
    let columns: Arc<[String]> = fetched.columns.into();
    Ok(fetched
        .rows
        .into_iter()
        .map(|values| Row::new(Arc::clone(&columns), values))
        .collect())
}

fn text(row: &Row, column: &str) -> Option<String> {
    match row.get(column)? {
        SqlValue::Null => None,
        SqlValue::Text(s) => Some(s.clone()),
        SqlValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
        other => Some(other.to_string()),
    }
}

fn int(row: &Row, column: &str) -> Option<i64> {
    row.get(column).and_then(SqlValue::as_i64)
}

fn small(row: &Row, column: &str) -> Option<u32> {
    int(row, column).and_then(|v| u32::try_from(v).ok())
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub(crate) fn table_names(conn: &SqlxConnection, database: &str) -> Result<Vec<String>, DbError> {
    let found = match conn.platform() {
        Platform::MySql if database.is_empty() => rows(
            conn,
            "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() ORDER BY TABLE_NAME",
            &[],
        )?,
        Platform::MySql => rows(
            conn,
            "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = ? ORDER BY TABLE_NAME",
            &[SqlValue::Text(database.to_string())],
        )?,
        // One file, one database
        Platform::Sqlite => rows(
            conn,
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?,
    };

    Ok(found.iter().filter_map(|row| text(row, "name")).collect())
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

pub(crate) fn table_columns(conn: &SqlxConnection, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    match conn.platform() {
        Platform::MySql => mysql_columns(conn, table),
        Platform::Sqlite => sqlite_columns(conn, table),
    }
}

fn mysql_columns(conn: &SqlxConnection, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    let found = rows(
        conn,
        "SELECT COLUMN_NAME AS name, DATA_TYPE AS data_type, \
         CHARACTER_MAXIMUM_LENGTH AS char_length, NUMERIC_PRECISION AS num_precision, \
         COLUMN_TYPE AS column_type, IS_NULLABLE AS nullable, \
         COLUMN_DEFAULT AS default_value, EXTRA AS extra \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION",
        &[SqlValue::Text(table.to_string())],
    )?;

    Ok(found
        .iter()
        .map(|row| {
            let column_type = text(row, "column_type").unwrap_or_default().to_lowercase();
            ColumnInfo {
                name: text(row, "name").unwrap_or_default(),
                type_name: text(row, "data_type").unwrap_or_default().to_lowercase(),
                length: small(row, "char_length"),
                precision: small(row, "num_precision"),
                unsigned: column_type.contains("unsigned"),
                nullable: text(row, "nullable").is_some_and(|v| v.eq_ignore_ascii_case("YES")),
                default: text(row, "default_value"),
                auto_increment: text(row, "extra")
                    .is_some_and(|v| v.to_lowercase().contains("auto_increment")),
            }
        })
        .collect())
}

/// `table_info` rows: `cid, name, type, notnull, dflt_value, pk`
fn sqlite_table_info(conn: &SqlxConnection, table: &str) -> Result<Vec<Row>, DbError> {
    rows(
        conn,
        &format!("PRAGMA table_info({})", conn.quote_identifier(table)),
        &[],
    )
}

fn sqlite_columns(conn: &SqlxConnection, table: &str) -> Result<Vec<ColumnInfo>, DbError> {
    let info = sqlite_table_info(conn, table)?;
    let pk_columns = info.iter().filter(|row| int(row, "pk").unwrap_or(0) > 0).count();

    Ok(info
        .iter()
        .map(|row| {
            let declared = text(row, "type").unwrap_or_default();
            let parsed = DeclaredType::parse(&declared);
            let pk = int(row, "pk").unwrap_or(0) > 0;
            ColumnInfo {
                name: text(row, "name").unwrap_or_default(),
                // INTEGER PRIMARY KEY aliases the rowid
                auto_increment: pk && pk_columns == 1 && parsed.base == "integer",
                type_name: parsed.base,
                length: parsed.length,
                precision: parsed.precision,
                unsigned: parsed.unsigned,
                nullable: int(row, "notnull").unwrap_or(0) == 0 && !pk,
                default: text(row, "dflt_value"),
            }
        })
        .collect())
}

/// A declared SQLite column type such as `VARCHAR(255)` or `DECIMAL(10,2)`
#[derive(Debug, PartialEq, Eq)]
struct DeclaredType {
    base: String,
    length: Option<u32>,
    precision: Option<u32>,
    unsigned: bool,
}

impl DeclaredType {
    fn parse(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();
        let unsigned = lower.contains("unsigned");
        let without_sign = lower.replace("unsigned", "");

        let (base, args) = match without_sign.split_once('(') {
            Some((base, rest)) => (base, rest.trim_end().trim_end_matches(')')),
            None => (without_sign.as_str(), ""),
        };

        let numbers: Vec<u32> = args
            .split(',')
            .filter_map(|n| n.trim().parse().ok())
            .collect();
        let (length, precision) = match numbers.as_slice() {
            [length] => (Some(*length), None),
            [precision, _scale] => (None, Some(*precision)),
            _ => (None, None),
        };

        Self {
            base: base.trim().to_string(),
            length,
            precision,
            unsigned,
        }
    }
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

pub(crate) fn table_indexes(conn: &SqlxConnection, table: &str) -> Result<Vec<IndexInfo>, DbError> {
    match conn.platform() {
        Platform::MySql => mysql_indexes(conn, table),
        Platform::Sqlite => sqlite_indexes(conn, table),
    }
}

fn mysql_indexes(conn: &SqlxConnection, table: &str) -> Result<Vec<IndexInfo>, DbError> {
    let found = rows(
        conn,
        "SELECT INDEX_NAME AS name, NON_UNIQUE AS non_unique, COLUMN_NAME AS column_name \
         FROM information_schema.STATISTICS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
         ORDER BY INDEX_NAME, SEQ_IN_INDEX",
        &[SqlValue::Text(table.to_string())],
    )?;

    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in &found {
        let name = text(row, "name").unwrap_or_default();
        let column = text(row, "column_name").unwrap_or_default();

        match indexes.last_mut() {
            Some(index) if index.name == name => index.columns.push(column),
            _ => indexes.push(IndexInfo {
                primary: name == PRIMARY_INDEX_NAME,
                unique: int(row, "non_unique") == Some(0),
                name,
                columns: vec![column],
            }),
        }
    }
    Ok(indexes)
}

fn sqlite_indexes(conn: &SqlxConnection, table: &str) -> Result<Vec<IndexInfo>, DbError> {
    let list = rows(
        conn,
        &format!("PRAGMA index_list({})", conn.quote_identifier(table)),
        &[],
    )?;

    let mut indexes = Vec::new();
    for entry in &list {
        let name = text(entry, "name").unwrap_or_default();
        let mut members = rows(
            conn,
            &format!("PRAGMA index_info({})", conn.quote_identifier(&name)),
            &[],
        )?;
        members.sort_by_key(|m| int(m, "seqno").unwrap_or(0));

        indexes.push(IndexInfo {
            primary: text(entry, "origin").as_deref() == Some("pk"),
            unique: int(entry, "unique") == Some(1),
            name,
            columns: members.iter().filter_map(|m| text(m, "name")).collect(),
        });
    }

    // A rowid primary key has no index of its own
    if !indexes.iter().any(|i| i.primary) {
        let mut pk: Vec<(i64, String)> = sqlite_table_info(conn, table)?
            .iter()
            .filter_map(|row| {
                let position = int(row, "pk").filter(|p| *p > 0)?;
                Some((position, text(row, "name")?))
            })
            .collect();
        if !pk.is_empty() {
            pk.sort();
            indexes.insert(
                0,
                IndexInfo {
                    name: PRIMARY_INDEX_NAME.to_string(),
                    primary: true,
                    unique: true,
                    columns: pk.into_iter().map(|(_, name)| name).collect(),
                },
            );
        }
    }

    Ok(indexes)
}
