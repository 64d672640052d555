//! dbbridge Driver - SQL backend adapter
//!
//! Implements the `ISqlConnection` port from `dbbridge-core` on top of sqlx
//! for MySQL and SQLite, and wires configuration, hooks, connection and
//! result cache together.
//!
//! ## Architecture
//!
//! This crate is a driven (secondary) adapter in the hexagonal architecture.
//! The sqlx driver is asynchronous; [`SqlxConnection`] hides that behind a
//! private current-thread runtime so the core stays synchronous.
//!
//! ## Key Components
//!
//! - [`SqlxConnection`] - Blocking MySQL/SQLite connection
//! - [`Connector`] - Hook-aware connection setup producing a `Database`
//!
//! ## Usage
//!
//! ```no_run
//! use dbbridge_core::config::{ConfigBuilder, LayeredConfig};
//! use dbbridge_driver::Connector;
//!
//! # fn example() -> Result<(), dbbridge_core::DbError> {
//! let request = ConfigBuilder::new()
//!     .driver("sqlite")
//!     .database("/var/lib/site/site.db")
//!     .cache_url("array://")
//!     .build();
//! let db = Connector::new().connect_layered(&LayeredConfig::new(request, Default::default()))?;
//! let tables = db.list_tables(None, false)?;
//! # Ok(())
//! # }
//! ```

pub mod connection;
pub mod connector;
mod decode;
mod error;
mod schema;

pub use connection::SqlxConnection;
pub use connector::Connector;
