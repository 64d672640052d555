//! In-memory result store
//!
//! Entries live in a [`DashMap`] so concurrent statements never block each
//! other on a global lock. Expiry is checked lazily on read.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dbbridge_core::domain::DbError;
use dbbridge_core::ports::IResultCache;

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    /// `None` never expires
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }
}

/// Per-connection result store (`array://`)
#[derive(Debug)]
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    name: &'static str,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::named("array")
    }

    pub(crate) fn named(name: &'static str) -> Self {
        Self {
            entries: DashMap::new(),
            name,
        }
    }

    /// Number of live entries, including ones not yet evicted after expiry
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl IResultCache for MemoryStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        let now = Instant::now();
        let found = self.entries.get(key).map(|entry| entry.clone());

        match found {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove_if(key, |_, e| e.is_expired(now));
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.data)),
            None => Ok(None),
        }
    }

    fn save(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), DbError> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            Some(Instant::now() + ttl)
        };
        self.entries.insert(
            key.to_string(),
            Entry {
                data: data.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        self.entries.remove(key);
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        self.name
    }
}
