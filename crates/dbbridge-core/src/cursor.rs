//! Seekable result cursor
//!
//! The backend hands out forward-only results, while callers need a stable
//! row count, row-by-row fetching and absolute seeking. [`ResultCursor`]
//! therefore drains the whole native result into memory when it is created
//! and serves every later operation from that buffer.
//!
//! Memory use grows with the result size. That fits bounded administrative
//! queries; it is the wrong tool for streaming very large result sets.

use std::sync::Arc;

use crate::domain::{CachedResult, DbError, Row, SqlValue};
use crate::ports::INativeResult;

/// Materialized, seekable view over the rows of one read query
pub struct ResultCursor {
    native: Option<Box<dyn INativeResult>>,
    columns: Arc<[String]>,
    rows: Vec<Vec<SqlValue>>,
    position: usize,
    query: String,
    from_cache: bool,
}

impl std::fmt::Debug for ResultCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCursor")
            .field("query", &self.query)
            .field("columns", &self.columns)
            .field("row_count", &self.rows.len())
            .field("position", &self.position)
            .field("from_cache", &self.from_cache)
            .finish()
    }
}

impl ResultCursor {
    /// Drains `native` into a new cursor positioned on the first row
    ///
    /// # Errors
    ///
    /// Propagates any error the native result reports while rows are pulled.
    pub fn from_native(
        native: Box<dyn INativeResult>,
        query: impl Into<String>,
    ) -> Result<Self, DbError> {
        Self::drain(native, query.into(), false)
    }

    pub(crate) fn drain(
        mut native: Box<dyn INativeResult>,
        query: String,
        from_cache: bool,
    ) -> Result<Self, DbError> {
        // Column names come from the native result, not from the rows, so
        // an empty result still reports its schema.
        let columns: Arc<[String]> = native.column_names().to_vec().into();

        let mut rows = Vec::new();
        while let Some(row) = native.next_row()? {
            rows.push(row);
        }

        Ok(Self {
            native: Some(native),
            columns,
            rows,
            position: 0,
            query,
            from_cache,
        })
    }

    /// Returns the current row in column order and advances by one
    ///
    /// `None` once every row has been fetched; that is not an error.
    pub fn fetch_row(&mut self) -> Option<Vec<SqlValue>> {
        let row = self.rows.get(self.position)?.clone();
        self.position += 1;
        Some(row)
    }

    /// Same as [`fetch_row`](Self::fetch_row) but keyed by column name
    pub fn fetch_assoc(&mut self) -> Option<Row> {
        self.fetch_row()
            .map(|values| Row::new(Arc::clone(&self.columns), values))
    }

    /// Returns the value at `offset` within the current row and advances by one
    ///
    /// `None` when no rows are left or when the row has no such column.
    pub fn fetch_field(&mut self, offset: usize) -> Option<SqlValue> {
        self.fetch_row()
            .and_then(|values| values.into_iter().nth(offset))
    }

    /// All remaining rows, keyed by column name
    pub fn fetch_all_assoc(&mut self) -> Vec<Row> {
        std::iter::from_fn(|| self.fetch_assoc()).collect()
    }

    /// The named column of every remaining row
    pub fn fetch_each(&mut self, column: &str) -> Vec<SqlValue> {
        let Some(index) = self.columns.iter().rposition(|c| c == column) else {
            return Vec::new();
        };
        std::iter::from_fn(|| self.fetch_row())
            .filter_map(|values| values.into_iter().nth(index))
            .collect()
    }

    /// Total buffered rows; constant for the cursor's lifetime
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Column count as reported by the native result
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    /// Index of the row the next fetch returns
    pub fn position(&self) -> usize {
        self.position
    }

    /// Moves to the row at `index`
    ///
    /// Seeking inside an empty result is a no-op for any non-negative index,
    /// since there is no position to reject against.
    ///
    /// # Errors
    ///
    /// [`DbError::OutOfBounds`] when `index` is negative, or when the cursor
    /// has rows and `index >= row_count()`.
    pub fn data_seek(&mut self, index: i64) -> Result<(), DbError> {
        let row_count = self.rows.len();
        let out_of_bounds = DbError::OutOfBounds { index, row_count };

        let target = usize::try_from(index).map_err(|_| out_of_bounds.clone())?;
        if row_count == 0 {
            return Ok(());
        }
        if target >= row_count {
            return Err(out_of_bounds);
        }

        self.position = target;
        Ok(())
    }

    /// Moves back to the first row
    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// The query this cursor was produced by
    pub fn query(&self) -> &str {
        &self.query
    }

    /// True when the rows were replayed from the query cache
    pub fn is_from_cache(&self) -> bool {
        self.from_cache
    }

    /// Snapshot of the buffered rows in cacheable form
    pub fn to_cached(&self) -> CachedResult {
        CachedResult {
            columns: self.columns.to_vec(),
            rows: self.rows.clone(),
        }
    }

    /// Releases the native result and discards the buffer
    pub fn free(mut self) {
        self.close_native();
        self.rows = Vec::new();
    }

    fn close_native(&mut self) {
        if let Some(mut native) = self.native.take() {
            native.close();
        }
    }
}

impl Drop for ResultCursor {
    fn drop(&mut self) {
        self.close_native();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use proptest::prelude::*;

    use super::*;
    use crate::array_result::ArrayResult;

    fn cursor(rows: usize) -> ResultCursor {
        let data = (0..rows)
            .map(|i| vec![SqlValue::Int(i as i64), SqlValue::Text(format!("row{i}"))])
            .collect();
        let native = ArrayResult::new(vec!["id".into(), "name".into()], data);
        ResultCursor::from_native(Box::new(native), "SELECT id, name FROM t").unwrap()
    }

    #[test]
    fn test_fetch_assoc_until_exhausted() {
        let mut c = cursor(3);
        assert!(c.fetch_assoc().is_some());
        assert!(c.fetch_assoc().is_some());
        assert!(c.fetch_assoc().is_some());
        assert!(c.fetch_assoc().is_none());
        assert!(c.fetch_assoc().is_none());
    }

    #[test]
    fn test_fetch_row_and_fetch_assoc_agree() {
        let mut a = cursor(2);
        let mut b = cursor(2);
        let positional = a.fetch_row().unwrap();
        let named = b.fetch_assoc().unwrap();
        assert_eq!(positional, named.values());
        assert_eq!(named.get("name"), Some(&SqlValue::Text("row0".into())));
    }

    #[test]
    fn test_fetch_field_reads_one_column_and_advances() {
        let mut c = cursor(2);
        assert_eq!(c.fetch_field(1), Some(SqlValue::Text("row0".into())));
        assert_eq!(c.position(), 1);
        assert_eq!(c.fetch_field(0), Some(SqlValue::Int(1)));
        assert_eq!(c.fetch_field(0), None);
    }

    #[test]
    fn test_seek_then_fetch_returns_that_row() {
        let mut c = cursor(5);
        c.data_seek(3).unwrap();
        assert_eq!(c.fetch_row().unwrap()[0], SqlValue::Int(3));
        assert_eq!(c.position(), 4);
        c.data_seek(0).unwrap();
        assert_eq!(c.fetch_row().unwrap()[0], SqlValue::Int(0));
    }

    #[test]
    fn test_seek_out_of_bounds() {
        let mut c = cursor(3);
        assert!(matches!(
            c.data_seek(-1),
            Err(DbError::OutOfBounds { index: -1, row_count: 3 })
        ));
        assert!(matches!(
            c.data_seek(3),
            Err(DbError::OutOfBounds { index: 3, row_count: 3 })
        ));
        assert_eq!(c.position(), 0);
    }

    #[test]
    fn test_seek_on_empty_result_is_noop() {
        let mut c = cursor(0);
        c.data_seek(0).unwrap();
        c.data_seek(42).unwrap();
        assert_eq!(c.position(), 0);
        assert!(c.data_seek(-1).is_err());
    }

    #[test]
    fn test_empty_result_keeps_column_schema() {
        let c = cursor(0);
        assert_eq!(c.row_count(), 0);
        assert_eq!(c.column_count(), 2);
        assert_eq!(c.column_names(), &["id".to_string(), "name".to_string()]);
    }

    #[test]
    fn test_fetch_each_and_fetch_all_assoc_consume_remaining_rows() {
        let mut c = cursor(3);
        c.fetch_row();
        assert_eq!(c.fetch_each("id"), vec![SqlValue::Int(1), SqlValue::Int(2)]);
        c.reset();
        assert_eq!(c.fetch_all_assoc().len(), 3);
        c.reset();
        assert!(c.fetch_each("missing").is_empty());
    }

    #[test]
    fn test_to_cached_snapshots_every_row() {
        let mut c = cursor(2);
        c.fetch_row();
        let cached = c.to_cached();
        assert_eq!(cached.columns, vec!["id", "name"]);
        assert_eq!(cached.rows.len(), 2);
    }

    struct CloseProbe {
        closed: Arc<AtomicBool>,
        columns: Vec<String>,
    }

    impl INativeResult for CloseProbe {
        fn column_names(&self) -> &[String] {
            &self.columns
        }
        fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
            Ok(None)
        }
        fn affected_rows(&self) -> u64 {
            0
        }
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_free_closes_native_result() {
        let closed = Arc::new(AtomicBool::new(false));
        let probe = CloseProbe {
            closed: Arc::clone(&closed),
            columns: vec![],
        };
        let c = ResultCursor::from_native(Box::new(probe), "SELECT 1").unwrap();
        assert!(!closed.load(Ordering::SeqCst));
        c.free();
        assert!(closed.load(Ordering::SeqCst));
    }

    struct FailingResult;

    impl INativeResult for FailingResult {
        fn column_names(&self) -> &[String] {
            &[]
        }
        fn next_row(&mut self) -> Result<Option<Vec<SqlValue>>, DbError> {
            Err(DbError::Backend(crate::domain::ErrorInfo::general("lost connection")))
        }
        fn affected_rows(&self) -> u64 {
            0
        }
        fn close(&mut self) {}
    }

    #[test]
    fn test_drain_propagates_backend_errors() {
        let err = ResultCursor::from_native(Box::new(FailingResult), "SELECT 1").unwrap_err();
        assert!(matches!(err, DbError::Backend(_)));
    }

    proptest! {
        #[test]
        fn test_row_count_is_invariant(rows in 0usize..20, ops in proptest::collection::vec(0u8..3, 0..40), seeks in proptest::collection::vec(-3i64..25, 0..40)) {
            let mut c = cursor(rows);
            for (op, seek) in ops.iter().zip(seeks.iter()) {
                match op {
                    0 => { c.fetch_row(); }
                    1 => { c.fetch_assoc(); }
                    _ => { let _ = c.data_seek(*seek); }
                }
                prop_assert_eq!(c.row_count(), rows);
            }
        }

        #[test]
        fn test_valid_seek_positions_next_fetch(rows in 1usize..20, pick in 0usize..20) {
            let index = pick % rows;
            let mut c = cursor(rows);
            c.data_seek(index as i64).unwrap();
            let row = c.fetch_row().unwrap();
            prop_assert_eq!(&row[0], &SqlValue::Int(index as i64));
            prop_assert_eq!(c.position(), index + 1);
        }

        #[test]
        fn test_empty_cursor_seek_never_fails(index in 0i64..i64::MAX) {
            let mut c = cursor(0);
            prop_assert!(c.data_seek(index).is_ok());
        }

        #[test]
        fn test_seek_to_row_count_always_fails(rows in 1usize..20) {
            let mut c = cursor(rows);
            prop_assert!(c.data_seek(rows as i64).is_err());
            prop_assert!(c.data_seek(-1).is_err());
        }
    }
}
