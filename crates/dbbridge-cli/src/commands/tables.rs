//! Tables command - List the tables of the configured database

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::Invocation;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct TablesCommand {
    /// Skip the table-list memo and ask the backend again
    #[arg(long)]
    pub no_cache: bool,
}

impl TablesCommand {
    pub fn execute(&self, invocation: &Invocation, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let db = invocation.connect()?;

        info!(database = %db.database_name(), "Listing tables");
        let tables = db
            .list_tables(None, self.no_cache)
            .context("Failed to list tables")?;

        if format.is_json() {
            let json = serde_json::json!({
                "database": db.database_name(),
                "tables": tables,
            });
            formatter.print_json(&json);
        } else if tables.is_empty() {
            formatter.warn("No tables found");
        } else {
            formatter.success(&format!(
                "{} table{} in '{}'",
                tables.len(),
                if tables.len() == 1 { "" } else { "s" },
                db.database_name()
            ));
            for table in &tables {
                formatter.info(table);
            }
        }

        db.disconnect();
        Ok(())
    }
}
