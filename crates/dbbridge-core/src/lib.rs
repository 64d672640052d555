//! dbbridge Core - Query execution, caching and result cursors
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `SqlValue`, `Row`, `CacheProfile`, `FieldDescriptor`, `DbError`
//! - **Configuration** - layered resolution into a flat `ResolvedConfig`
//! - **Executor** - `Statement` with parameter binding and result caching
//! - **Cursor** - `ResultCursor`, a materialized result with absolute seeking
//! - **Facade** - `Database`, the handle callers hold after connecting
//! - **Port definitions** - Traits for adapters: `ISqlConnection`, `IResultCache`, `IValueCodec`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! It performs no I/O of its own. Ports define trait interfaces that the
//! driver and cache crates implement.

pub mod array_result;
pub mod config;
pub mod cursor;
pub mod database;
pub mod domain;
pub mod ports;
pub mod query_cache;
pub mod sql;
pub mod statement;

#[cfg(test)]
mod testing;

pub use array_result::ArrayResult;
pub use config::{ConfigLayer, ConnectionParams, Driver, ExecutionMode, LayeredConfig, ResolvedConfig};
pub use cursor::ResultCursor;
pub use database::Database;
pub use domain::{BindValue, DbError, ErrorInfo, Row, SqlValue};
pub use query_cache::QueryCache;
pub use statement::{ExecuteResult, Statement, StatementState, WriteOutcome};
