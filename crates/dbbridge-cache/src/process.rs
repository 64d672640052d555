//! Process-wide result stores
//!
//! `apc://` and `xcache://` select a store that outlives any single
//! connection: every connection in the process resolving to the same flavor
//! shares one map.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dbbridge_core::domain::{DbError, ProcessCacheFlavor};
use dbbridge_core::ports::IResultCache;

use crate::memory::MemoryStore;

static APC: OnceLock<Arc<MemoryStore>> = OnceLock::new();
static XCACHE: OnceLock<Arc<MemoryStore>> = OnceLock::new();

/// Handle on the shared store of one flavor
#[derive(Debug, Clone)]
pub struct ProcessStore {
    shared: Arc<MemoryStore>,
}

impl ProcessStore {
    pub fn new(flavor: ProcessCacheFlavor) -> Self {
        let cell = match flavor {
            ProcessCacheFlavor::Apc => &APC,
            ProcessCacheFlavor::Xcache => &XCACHE,
        };
        let shared = cell.get_or_init(|| {
            let name = match flavor {
                ProcessCacheFlavor::Apc => "apc",
                ProcessCacheFlavor::Xcache => "xcache",
            };
            Arc::new(MemoryStore::named(name))
        });
        Self {
            shared: Arc::clone(shared),
        }
    }
}

impl IResultCache for ProcessStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.shared.fetch(key)
    }

    fn save(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), DbError> {
        self.shared.save(key, data, ttl)
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        self.shared.delete(key)
    }

    fn backend_name(&self) -> &'static str {
        self.shared.backend_name()
    }
}
