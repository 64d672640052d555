//! memcached result store

use std::time::Duration;

use dbbridge_core::domain::{CacheEndpoint, DbError};
use dbbridge_core::ports::IResultCache;

/// Seconds before a memcached round trip is abandoned
const IO_TIMEOUT_SECS: u64 = 2;

/// Result store backed by a memcached server (`memcache://`)
pub struct MemcacheStore {
    client: memcache::Client,
    endpoint: CacheEndpoint,
}

impl std::fmt::Debug for MemcacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcacheStore")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl MemcacheStore {
    /// Connects to the server at `endpoint`
    ///
    /// # Errors
    ///
    /// [`DbError::Cache`] when the server cannot be reached.
    pub fn connect(endpoint: &CacheEndpoint) -> Result<Self, DbError> {
        let url = connection_url(endpoint);
        let client = memcache::Client::connect(url.as_str())
            .map_err(|e| DbError::Cache(format!("memcache {}: {}", endpoint, e)))?;

        tracing::debug!(%endpoint, "Connected to memcached");
        Ok(Self {
            client,
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &CacheEndpoint {
        &self.endpoint
    }

    fn cache_error(&self, e: memcache::MemcacheError) -> DbError {
        DbError::Cache(format!("memcache {}: {}", self.endpoint, e))
    }
}

pub(crate) fn connection_url(endpoint: &CacheEndpoint) -> String {
    match endpoint {
        CacheEndpoint::Tcp { host, port } => format!(
            "memcache://{}:{}?timeout={}&tcp_nodelay=true",
            host, port, IO_TIMEOUT_SECS
        ),
        CacheEndpoint::Socket(path) => format!("memcache://{}", path.display()),
    }
}

impl IResultCache for MemcacheStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.client
            .get::<Vec<u8>>(key)
            .map_err(|e| self.cache_error(e))
    }

    fn save(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), DbError> {
        // memcached reads 0 as "never expires"
        let expiration = if ttl.is_zero() {
            0
        } else {
            u32::try_from(ttl.as_secs().max(1)).unwrap_or(u32::MAX)
        };
        self.client
            .set(key, data, expiration)
            .map_err(|e| self.cache_error(e))
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        self.client
            .delete(key)
            .map(|_| ())
            .map_err(|e| self.cache_error(e))
    }

    fn backend_name(&self) -> &'static str {
        "memcache"
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_tcp_url_carries_timeout() {
        let url = connection_url(&CacheEndpoint::Tcp {
            host: "cache.local".into(),
            port: 11211,
        });
        assert_eq!(
            url,
            "memcache://cache.local:11211?timeout=2&tcp_nodelay=true"
        );
    }

    #[test]
    fn test_socket_url_has_empty_host() {
        let url = connection_url(&CacheEndpoint::Socket(PathBuf::from(
            "/var/run/memcached.sock",
        )));
        assert_eq!(url, "memcache:///var/run/memcached.sock");
    }
}
