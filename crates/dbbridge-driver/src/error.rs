//! Mapping of sqlx errors onto the backend error triple

use dbbridge_core::domain::{DbError, ErrorInfo};
use sqlx::mysql::MySqlDatabaseError;

/// Extracts `(SQLSTATE, driver code, message)` from a sqlx error
///
/// MySQL reports a real SQLSTATE plus its numeric error number. SQLite has
/// no SQLSTATE; its (extended) result code becomes the driver code.
pub(crate) fn error_info(err: &sqlx::Error) -> ErrorInfo {
    match err {
        sqlx::Error::Database(db) => {
            if let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>() {
                return ErrorInfo::new(
                    mysql.code().unwrap_or(ErrorInfo::GENERAL_ERROR_STATE),
                    Some(i64::from(mysql.number())),
                    mysql.message(),
                );
            }
            let code = db.code().and_then(|c| c.parse::<i64>().ok());
            ErrorInfo::new(ErrorInfo::GENERAL_ERROR_STATE, code, db.message())
        }
        other => ErrorInfo::general(other.to_string()),
    }
}

pub(crate) fn backend_error(err: &sqlx::Error) -> DbError {
    DbError::Backend(error_info(err))
}
