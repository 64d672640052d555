//! Conversion between sqlx rows and [`SqlValue`]s
//!
//! Values are decoded by the column type the server reports, not by the
//! declared Rust type, since the executor only ever sees dynamic rows.
//! Temporal columns come back as their canonical SQL text.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use dbbridge_core::domain::SqlValue;
use sqlx::mysql::MySqlRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row, TypeInfo, ValueRef};

const ZERO_DATE: &str = "0000-00-00";
const ZERO_TIME: &str = "00:00:00";
const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// Binds every parameter to a `sqlx::query`, in order
macro_rules! bind_params {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for param in $params {
            query = match param {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Int(i) => query.bind(*i),
                SqlValue::Float(f) => query.bind(*f),
                SqlValue::Text(s) => query.bind(s.clone()),
                SqlValue::Bytes(b) => query.bind(b.clone()),
            };
        }
        query
    }};
}
pub(crate) use bind_params;

/// Column names of a row, in select order
pub(crate) fn column_names<R: Row>(row: &R) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

pub(crate) fn mysql_row(row: &MySqlRow) -> Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|i| mysql_value(row, i)).collect()
}

fn mysql_value(row: &MySqlRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOLEAN" | "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?)
        }
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => {
            let unsigned = row.try_get_unchecked::<u64, _>(index)?;
            // Values past i64::MAX keep their exact digits as text
            i64::try_from(unsigned)
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(unsigned.to_string()))
        }
        "FLOAT" => SqlValue::Float(f64::from(row.try_get_unchecked::<f32, _>(index)?)),
        "DOUBLE" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        // Zero dates and out-of-range TIME values have no chrono form
        "DATE" => match row.try_get_unchecked::<NaiveDate, _>(index) {
            Ok(date) => SqlValue::Text(date.format("%Y-%m-%d").to_string()),
            Err(_) => unparsed_temporal(row.try_get_unchecked::<Vec<u8>, _>(index)?, ZERO_DATE),
        },
        "TIME" => match row.try_get_unchecked::<NaiveTime, _>(index) {
            Ok(time) => SqlValue::Text(time.format("%H:%M:%S").to_string()),
            Err(_) => unparsed_temporal(row.try_get_unchecked::<Vec<u8>, _>(index)?, ZERO_TIME),
        },
        "DATETIME" | "TIMESTAMP" => match row.try_get_unchecked::<NaiveDateTime, _>(index) {
            Ok(stamp) => SqlValue::Text(stamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            Err(_) => {
                unparsed_temporal(row.try_get_unchecked::<Vec<u8>, _>(index)?, ZERO_DATETIME)
            }
        },
        "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BINARY" | "VARBINARY" | "BIT"
        | "GEOMETRY" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        // DECIMAL travels as text in both protocols, as do CHAR, TEXT, ENUM, SET, JSON
        _ => text_or_bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
    };
    Ok(value)
}

pub(crate) fn sqlite_row(row: &SqliteRow) -> Result<Vec<SqlValue>, sqlx::Error> {
    (0..row.len()).map(|i| sqlite_value(row, i)).collect()
}

fn sqlite_value(row: &SqliteRow, index: usize) -> Result<SqlValue, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(SqlValue::Null);
    }
    // The storage class of this value, not the declared column affinity
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "INTEGER" | "BIGINT" | "BOOLEAN" => SqlValue::Int(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" => SqlValue::Float(row.try_get_unchecked::<f64, _>(index)?),
        "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(index)?),
        _ => SqlValue::Text(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}

fn text_or_bytes(bytes: Vec<u8>) -> SqlValue {
    match String::from_utf8(bytes) {
        Ok(text) => SqlValue::Text(text),
        Err(e) => SqlValue::Bytes(e.into_bytes()),
    }
}

/// Temporal value chrono could not decode, kept as the server sent it
///
/// The text protocol already carries the literal. The binary protocol
/// sends a zero value as an empty (or all-zero) payload, which maps back
/// to `zero`.
fn unparsed_temporal(bytes: Vec<u8>, zero: &str) -> SqlValue {
    if bytes.iter().all(|b| *b == 0) {
        return SqlValue::Text(zero.to_string());
    }
    text_or_bytes(bytes)
}
