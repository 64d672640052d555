//! dbbridge Cache - Result stores for the query cache
//!
//! Implements the [`IResultCache`] port for every backend a cache selector
//! URL can name:
//!
//! - [`MemoryStore`] - per-connection in-memory map (`array://`)
//! - [`ProcessStore`] - map shared by the whole process (`apc://`, `xcache://`)
//! - [`MemcacheStore`] - memcached over TCP or a local socket
//! - [`RedisStore`] - redis over TCP or a local socket

use std::sync::Arc;

use dbbridge_core::domain::{CacheBackend, DbError};
use dbbridge_core::ports::IResultCache;

pub mod memcache_store;
pub mod memory;
pub mod process;
pub mod redis_store;

pub use memcache_store::MemcacheStore;
pub use memory::MemoryStore;
pub use process::ProcessStore;
pub use redis_store::RedisStore;

/// Opens the store for `backend`
///
/// Returns `Ok(None)` for [`CacheBackend::Disabled`].
///
/// # Errors
///
/// [`DbError::Cache`] when a networked backend cannot be reached.
pub fn open_store(backend: &CacheBackend) -> Result<Option<Arc<dyn IResultCache>>, DbError> {
    let store: Arc<dyn IResultCache> = match backend {
        CacheBackend::Disabled => return Ok(None),
        CacheBackend::Array => Arc::new(MemoryStore::new()),
        CacheBackend::ProcessLocal(flavor) => Arc::new(ProcessStore::new(*flavor)),
        CacheBackend::Memcache(endpoint) => Arc::new(MemcacheStore::connect(endpoint)?),
        CacheBackend::Redis(endpoint) => Arc::new(RedisStore::connect(endpoint)?),
    };

    tracing::debug!(backend = %backend, "Opened result cache store");
    Ok(Some(store))
}
