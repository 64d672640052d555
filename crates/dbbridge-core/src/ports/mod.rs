//! Port definitions (hexagonal architecture interfaces)
//!
//! The executor and the database facade depend only on these traits; the
//! adapter crates provide the implementations.
//!
//! ## Ports Overview
//!
//! - [`ISqlConnection`] / [`INativeResult`] - SQL backend session and its forward-only results
//! - [`IResultCache`] - Key/value store for cached query results
//! - [`IValueCodec`] - Serialization of composite bound values
//! - [`IPreConnectHook`] / [`IPostConnectHook`] - Connection lifecycle observers

pub mod hooks;
pub mod result_cache;
pub mod sql_connection;
pub mod value_codec;

pub use hooks::{IPostConnectHook, IPreConnectHook};
pub use result_cache::IResultCache;
pub use sql_connection::{INativeResult, ISqlConnection, Platform};
pub use value_codec::{IValueCodec, JsonCodec};
