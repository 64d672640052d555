//! Query command - Run one SQL statement
//!
//! Provides the `dbbridge query <SQL>` CLI command which:
//! 1. Prepares the statement and binds `--param` values to its `?` placeholders
//! 2. Executes it through the result cache unless `--uncached` is given
//! 3. Prints the rows, or the affected-row count and last insert id

use anyhow::{Context, Result};
use clap::Args;
use dbbridge_core::{ExecuteResult, ResultCursor, SqlValue, WriteOutcome};
use tracing::info;

use super::Invocation;
use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Args)]
pub struct QueryCommand {
    /// SQL statement; `?` placeholders take the --param values in order
    pub sql: String,

    /// Positional parameter (integers and decimals are sent as numbers, NULL as null)
    #[arg(short, long = "param")]
    pub params: Vec<String>,

    /// Bypass the result cache
    #[arg(long)]
    pub uncached: bool,
}

impl QueryCommand {
    pub fn execute(&self, invocation: &Invocation, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let db = invocation.connect()?;

        let params: Vec<SqlValue> = self.params.iter().map(|p| parse_param(p)).collect();
        info!(params = params.len(), uncached = self.uncached, "Running query");

        let mut stmt = db.prepare(&self.sql).context("Failed to prepare query")?;
        let result = if self.uncached {
            stmt.execute_uncached(&params)
        } else {
            stmt.execute(&params)
        }
        .context("Query failed")?;

        match result {
            ExecuteResult::Rows(cursor) => print_rows(cursor, format, &*formatter),
            ExecuteResult::Written(outcome) => print_outcome(outcome, format, &*formatter),
        }

        db.disconnect();
        Ok(())
    }
}

/// Maps a command-line parameter to the value sent to the backend
fn parse_param(raw: &str) -> SqlValue {
    if raw.eq_ignore_ascii_case("null") {
        SqlValue::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        SqlValue::Int(i)
    } else if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
        SqlValue::Float(f)
    } else {
        SqlValue::Text(raw.to_string())
    }
}

fn print_rows(mut cursor: ResultCursor, format: OutputFormat, formatter: &dyn OutputFormatter) {
    let columns = cursor.column_names().to_vec();
    let from_cache = cursor.is_from_cache();
    let rows = cursor.fetch_all_assoc();

    if format.is_json() {
        let json = serde_json::json!({
            "columns": columns,
            "rows": rows.iter().map(|row| row.to_json()).collect::<Vec<_>>(),
            "row_count": rows.len(),
            "from_cache": from_cache,
        });
        formatter.print_json(&json);
        return;
    }

    let cells: Vec<Vec<String>> = rows
        .iter()
        .map(|row| row.values().iter().map(SqlValue::to_string).collect())
        .collect();
    formatter.print_table(&columns, &cells);
    formatter.success(&format!(
        "{} row{}{}",
        rows.len(),
        if rows.len() == 1 { "" } else { "s" },
        if from_cache { " (from cache)" } else { "" }
    ));
}

fn print_outcome(outcome: WriteOutcome, format: OutputFormat, formatter: &dyn OutputFormatter) {
    if format.is_json() {
        let json = serde_json::json!({
            "affected_rows": outcome.affected_rows,
            "last_insert_id": outcome.last_insert_id,
        });
        formatter.print_json(&json);
        return;
    }

    formatter.success(&format!(
        "{} row{} affected",
        outcome.affected_rows,
        if outcome.affected_rows == 1 { "" } else { "s" }
    ));
    if let Some(id) = outcome.last_insert_id {
        formatter.info(&format!("Last insert id: {}", id));
    }
}
