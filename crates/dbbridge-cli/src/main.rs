//! dbbridge CLI - Command-line access to the dbbridge adapter
//!
//! Provides commands for:
//! - Running queries through the cache-aware statement executor
//! - Listing tables and describing their fields
//! - Viewing, changing and validating configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{
    completions::CompletionsCommand, config::ConfigCommand, fields::FieldsCommand,
    query::QueryCommand, tables::TablesCommand, Invocation, ModeArg,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "dbbridge", version, about = "Cache-aware SQL access for legacy callers")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Execution mode, selects the default cache TTL
    #[arg(long, global = true, value_enum)]
    mode: Option<ModeArg>,

    /// Database driver (mysql, mysqli, doctrinemysql, sqlite)
    #[arg(long, global = true)]
    driver: Option<String>,

    /// Database host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Database name, or file path for sqlite
    #[arg(long, global = true)]
    database: Option<String>,

    /// Cache backend URL (array://, apc://, memcache://host:port, redis://host:port)
    #[arg(long, global = true)]
    cache_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one SQL statement
    Query(QueryCommand),
    /// List the tables of the database
    Tables(TablesCommand),
    /// Describe the fields and indexes of a table
    Fields(FieldsCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let request = commands::request_layer(
        cli.mode,
        cli.driver.as_deref(),
        cli.host.as_deref(),
        cli.database.as_deref(),
        cli.cache_url.as_deref(),
    );
    let invocation = Invocation::new(cli.config.as_deref(), request)?;

    // Setup tracing
    let filter = match cli.verbose {
        0 => invocation.logging_level(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match cli.command {
        Commands::Query(cmd) => cmd.execute(&invocation, format),
        Commands::Tables(cmd) => cmd.execute(&invocation, format),
        Commands::Fields(cmd) => cmd.execute(&invocation, format),
        Commands::Config(cmd) => cmd.execute(&invocation, format),
        Commands::Completions(cmd) => cmd.execute(format),
    }
}
