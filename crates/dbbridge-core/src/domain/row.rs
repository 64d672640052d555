//! Result rows
//!
//! A [`Row`] pairs the column names of its result (shared across all rows of
//! that result) with the row's values in column order, so it serves both
//! positional and name-keyed access.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::value::SqlValue;

/// One result row with name- and index-based access
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a row; `values` must be in the same order as `columns`
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Value of the named column
    ///
    /// When a name occurs more than once the last occurrence wins, matching
    /// associative fetch semantics.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .rposition(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    /// Value at the given column index
    pub fn get_index(&self, index: usize) -> Option<&SqlValue> {
        self.values.get(index)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over `(column, value)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Column-name keyed JSON object
    pub fn to_json(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_json()))
            .collect();
        serde_json::Value::Object(map)
    }
}

/// A fully materialized result as stored in the result cache
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}
