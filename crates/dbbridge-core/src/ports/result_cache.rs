//! Result cache port (driven/secondary port)
//!
//! Stores opaque, already-serialized query results under string keys with a
//! time-to-live. Eviction beyond the TTL is left to the backend.

use std::time::Duration;

use crate::domain::DbError;

/// Port trait for a key/value result cache
pub trait IResultCache: Send + Sync {
    /// Returns the payload stored under `key`, `None` on miss or expiry
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError>;

    /// Stores `data` under `key`; a zero TTL means no expiry
    fn save(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), DbError>;

    /// Removes `key`; removing a missing key is not an error
    fn delete(&self, key: &str) -> Result<(), DbError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}
