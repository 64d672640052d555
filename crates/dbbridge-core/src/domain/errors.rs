//! Error types
//!
//! A single error enum covers configuration mistakes, empty queries, errors
//! surfaced by the SQL backend, invalid cursor seeks and adapter failures.
//! Backend errors keep the original SQLSTATE, driver code and message so
//! callers that branch on those codes keep working.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The (state, code, message) triple reported by the SQL backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Five-character SQLSTATE, `HY000` when the backend did not provide one
    pub state: String,
    /// Driver-specific error number, if any
    pub code: Option<i64>,
    /// Human-readable message as reported by the backend
    pub message: String,
}

impl ErrorInfo {
    /// Generic SQLSTATE used when the driver reports none
    pub const GENERAL_ERROR_STATE: &'static str = "HY000";

    pub fn new(state: impl Into<String>, code: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            code,
            message: message.into(),
        }
    }

    /// An error with no SQLSTATE and no driver code, e.g. an I/O failure
    pub fn general(message: impl Into<String>) -> Self {
        Self::new(Self::GENERAL_ERROR_STATE, None, message)
    }
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(
                f,
                "SQLSTATE {}: error {}: {}",
                self.state, code, self.message
            ),
            None => write!(f, "SQLSTATE {}: error : {}", self.state, self.message),
        }
    }
}

/// Errors raised by dbbridge operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DbError {
    /// Unknown driver, unknown cache scheme or otherwise unusable configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation the adapter deliberately does not provide
    #[error("Not implemented yet: {0}")]
    Unimplemented(String),

    /// `prepare` or `query` was called without query text
    #[error("Empty query string")]
    EmptyQuery,

    /// Error reported by the SQL backend, preserved verbatim
    #[error("{0}")]
    Backend(ErrorInfo),

    /// Cursor seek to an index outside the buffered rows
    #[error("Invalid row index {index} (row count {row_count})")]
    OutOfBounds {
        /// The requested index
        index: i64,
        /// Number of buffered rows
        row_count: usize,
    },

    /// Post-execution accessor called before any execution
    #[error("No statement has been executed yet")]
    NotExecuted,

    /// Cache backend failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Encoding or decoding of values failed
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl DbError {
    /// Returns the backend error triple for [`DbError::Backend`]
    pub fn error_info(&self) -> Option<&ErrorInfo> {
        match self {
            DbError::Backend(info) => Some(info),
            _ => None,
        }
    }

    /// Configuration and unimplemented-operation errors indicate a deployment
    /// or programming mistake and must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, DbError::Configuration(_) | DbError::Unimplemented(_))
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}
