//! Query result caching
//!
//! A [`QueryCache`] binds a [`CacheProfile`] to a live [`IResultCache`]
//! store. Results are keyed by namespace, query text and parameters and
//! stored as JSON-encoded [`CachedResult`] payloads.

use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::{CacheProfile, CachedResult, DbError, SqlValue};
use crate::ports::IResultCache;

/// A cache profile together with the store it caches into
#[derive(Clone)]
pub struct QueryCache {
    profile: CacheProfile,
    store: Arc<dyn IResultCache>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("profile", &self.profile)
            .field("store", &self.store.backend_name())
            .finish()
    }
}

impl QueryCache {
    pub fn new(profile: CacheProfile, store: Arc<dyn IResultCache>) -> Self {
        Self { profile, store }
    }

    pub fn profile(&self) -> &CacheProfile {
        &self.profile
    }

    pub fn store(&self) -> &Arc<dyn IResultCache> {
        &self.store
    }

    /// False when the profile's backend is disabled, whatever the store
    pub fn is_enabled(&self) -> bool {
        self.profile.is_enabled()
    }

    /// Cache key for a query and its parameters
    ///
    /// `namespace` followed by the hex SHA-256 of the query, a NUL separator
    /// and the JSON-encoded parameter list.
    pub fn cache_key(&self, query: &str, params: &[SqlValue]) -> Result<String, DbError> {
        let encoded_params = serde_json::to_vec(params)?;

        let mut hasher = Sha256::new();
        hasher.update(query.as_bytes());
        hasher.update([0u8]);
        hasher.update(&encoded_params);

        Ok(format!("{}{:x}", self.profile.namespace, hasher.finalize()))
    }

    /// Looks up a stored result
    pub fn fetch(&self, key: &str) -> Result<Option<CachedResult>, DbError> {
        match self.store.fetch(key)? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Stores a result under `key` with the profile's TTL
    ///
    /// Results holding NaN or infinite floats are not stored: JSON has no
    /// encoding for them and the payload would never decode again.
    pub fn save(&self, key: &str, result: &CachedResult) -> Result<(), DbError> {
        if !is_cacheable(result) {
            debug!(key, "Result holds non-finite floats, not caching");
            return Ok(());
        }
        let payload = serde_json::to_vec(result)?;
        self.store.save(key, &payload, self.profile.ttl)
    }
}

fn is_cacheable(result: &CachedResult) -> bool {
    result
        .rows
        .iter()
        .flatten()
        .all(|value| !matches!(value, SqlValue::Float(f) if !f.is_finite()))
}
