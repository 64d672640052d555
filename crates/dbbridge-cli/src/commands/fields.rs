//! Fields command - Describe the fields and indexes of one table
//!
//! Multi-column indexes are listed after the columns, with their member
//! columns in the `extra` cell.

use anyhow::{Context, Result};
use clap::Args;
use dbbridge_core::domain::FieldDescriptor;
use tracing::info;

use super::Invocation;
use crate::output::{get_formatter, OutputFormat};

const HEADERS: [&str; 7] = ["name", "type", "length", "index", "null", "default", "extra"];

#[derive(Debug, Args)]
pub struct FieldsCommand {
    /// Table to describe
    pub table: String,
}

impl FieldsCommand {
    pub fn execute(&self, invocation: &Invocation, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let db = invocation.connect()?;

        info!(table = %self.table, "Describing table");
        let fields = db
            .list_fields(&self.table)
            .with_context(|| format!("Failed to describe table '{}'", self.table))?;

        if format.is_json() {
            let json = serde_json::to_value(&fields).context("Failed to serialize fields")?;
            formatter.print_json(&json);
        } else if fields.is_empty() {
            formatter.warn(&format!("Table '{}' has no fields", self.table));
        } else {
            let headers: Vec<String> = HEADERS.iter().map(|h| h.to_string()).collect();
            let rows: Vec<Vec<String>> = fields.iter().map(field_cells).collect();
            formatter.print_table(&headers, &rows);
        }

        db.disconnect();
        Ok(())
    }
}

fn field_cells(field: &FieldDescriptor) -> Vec<String> {
    let length = field
        .length
        .or(field.precision)
        .map(|n| n.to_string())
        .unwrap_or_default();
    let field_type = if field.attributes.is_empty() {
        field.field_type.clone()
    } else {
        format!("{} {}", field.field_type, field.attributes)
    };
    let extra = if field.is_index_row() {
        field.index_fields.join(", ")
    } else {
        field.extra.clone()
    };

    vec![
        field.name.clone(),
        field_type,
        length,
        field.index.to_string(),
        if field.nullable { "YES" } else { "NO" }.to_string(),
        field.default.clone().unwrap_or_else(|| "NULL".to_string()),
        extra,
    ]
}
