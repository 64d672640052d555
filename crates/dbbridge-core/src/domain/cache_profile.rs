//! Query cache profile and cache backend selection
//!
//! The cache backend is chosen by a URL-style selector string:
//!
//! | Selector                          | Backend                         |
//! |-----------------------------------|---------------------------------|
//! | `""`                              | [`CacheBackend::Disabled`]      |
//! | `array:` / `array://`             | [`CacheBackend::Array`]         |
//! | `apc://`, `xcache://`             | [`CacheBackend::ProcessLocal`]  |
//! | `memcache://host:port`            | [`CacheBackend::Memcache`]      |
//! | `memcache:///path/to/socket`      | memcache over a local socket    |
//! | `redis://host:port`               | [`CacheBackend::Redis`]         |
//! | `redis:///path/to/socket`         | redis over a local socket       |
//!
//! Unknown schemes are rejected when the selector is parsed, never at use.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use super::errors::DbError;

/// Default memcached port
pub const MEMCACHE_DEFAULT_PORT: u16 = 11211;
/// Default redis port
pub const REDIS_DEFAULT_PORT: u16 = 6379;

/// Where a networked cache backend listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEndpoint {
    Tcp { host: String, port: u16 },
    Socket(PathBuf),
}

impl Display for CacheEndpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CacheEndpoint::Tcp { host, port } => write!(f, "{}:{}", host, port),
            CacheEndpoint::Socket(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Flavor of the process-local cache; each flavor has one store per process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCacheFlavor {
    Apc,
    Xcache,
}

/// Cache backend kinds, parsed from a URL selector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Per-connection in-memory store
    Array,
    /// Store shared by every connection in the process
    ProcessLocal(ProcessCacheFlavor),
    Memcache(CacheEndpoint),
    Redis(CacheEndpoint),
    /// No caching at all, regardless of TTL and namespace
    #[default]
    Disabled,
}

impl CacheBackend {
    /// Parses a cache selector URL
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Configuration`] for malformed URLs and unknown schemes.
    pub fn parse(selector: &str) -> Result<Self, DbError> {
        let selector = selector.trim();
        if selector.is_empty() {
            return Ok(CacheBackend::Disabled);
        }

        let url = Url::parse(selector).map_err(|e| {
            DbError::Configuration(format!("Invalid cache URL '{}': {}", selector, e))
        })?;

        match url.scheme() {
            "array" => Ok(CacheBackend::Array),
            "apc" => Ok(CacheBackend::ProcessLocal(ProcessCacheFlavor::Apc)),
            "xcache" => Ok(CacheBackend::ProcessLocal(ProcessCacheFlavor::Xcache)),
            "memcache" => Ok(CacheBackend::Memcache(endpoint_from_url(
                &url,
                MEMCACHE_DEFAULT_PORT,
            )?)),
            "redis" => Ok(CacheBackend::Redis(endpoint_from_url(
                &url,
                REDIS_DEFAULT_PORT,
            )?)),
            other => Err(DbError::Configuration(format!(
                "Cache backend '{}' is not supported",
                other
            ))),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, CacheBackend::Disabled)
    }

    /// Short backend name for logs
    pub fn name(&self) -> &'static str {
        match self {
            CacheBackend::Array => "array",
            CacheBackend::ProcessLocal(ProcessCacheFlavor::Apc) => "apc",
            CacheBackend::ProcessLocal(ProcessCacheFlavor::Xcache) => "xcache",
            CacheBackend::Memcache(_) => "memcache",
            CacheBackend::Redis(_) => "redis",
            CacheBackend::Disabled => "disabled",
        }
    }
}

impl FromStr for CacheBackend {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Display for CacheBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackend::Memcache(endpoint) | CacheBackend::Redis(endpoint) => {
                write!(f, "{}({})", self.name(), endpoint)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

fn endpoint_from_url(url: &Url, default_port: u16) -> Result<CacheEndpoint, DbError> {
    match url.host_str().filter(|h| !h.is_empty()) {
        Some(host) => Ok(CacheEndpoint::Tcp {
            host: host.to_string(),
            port: url.port().unwrap_or(default_port),
        }),
        None if url.path().len() > 1 => Ok(CacheEndpoint::Socket(PathBuf::from(url.path()))),
        None => Err(DbError::Configuration(format!(
            "Cache URL '{}' needs a host or a socket path",
            url
        ))),
    }
}

/// Whether and how query results are cached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheProfile {
    pub ttl: Duration,
    pub namespace: String,
    pub backend: CacheBackend,
}

impl CacheProfile {
    pub fn new(ttl: Duration, namespace: impl Into<String>, backend: CacheBackend) -> Self {
        Self {
            ttl,
            namespace: namespace.into(),
            backend,
        }
    }

    /// A profile that never caches
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, "", CacheBackend::Disabled)
    }

    /// True when executions under this profile may use the cache
    pub fn is_enabled(&self) -> bool {
        !self.backend.is_disabled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_selector_disables_caching() {
        assert_eq!(CacheBackend::parse("").unwrap(), CacheBackend::Disabled);
        assert_eq!(CacheBackend::parse("   ").unwrap(), CacheBackend::Disabled);
    }

    #[test]
    fn test_array_and_process_local_schemes() {
        assert_eq!(CacheBackend::parse("array://").unwrap(), CacheBackend::Array);
        assert_eq!(CacheBackend::parse("array:").unwrap(), CacheBackend::Array);
        assert_eq!(
            CacheBackend::parse("apc://").unwrap(),
            CacheBackend::ProcessLocal(ProcessCacheFlavor::Apc)
        );
        assert_eq!(
            CacheBackend::parse("XCACHE://").unwrap(),
            CacheBackend::ProcessLocal(ProcessCacheFlavor::Xcache)
        );
    }

    #[test]
    fn test_memcache_tcp_with_default_port() {
        assert_eq!(
            CacheBackend::parse("memcache://cache.local").unwrap(),
            CacheBackend::Memcache(CacheEndpoint::Tcp {
                host: "cache.local".into(),
                port: MEMCACHE_DEFAULT_PORT,
            })
        );
    }

    #[test]
    fn test_redis_tcp_with_explicit_port() {
        assert_eq!(
            CacheBackend::parse("redis://10.0.0.5:6380").unwrap(),
            CacheBackend::Redis(CacheEndpoint::Tcp {
                host: "10.0.0.5".into(),
                port: 6380,
            })
        );
    }

    #[test]
    fn test_socket_paths() {
        assert_eq!(
            CacheBackend::parse("memcache:///var/run/memcached.sock").unwrap(),
            CacheBackend::Memcache(CacheEndpoint::Socket(PathBuf::from(
                "/var/run/memcached.sock"
            )))
        );
        assert_eq!(
            CacheBackend::parse("redis:///tmp/redis.sock").unwrap(),
            CacheBackend::Redis(CacheEndpoint::Socket(PathBuf::from("/tmp/redis.sock")))
        );
    }

    #[test]
    fn test_unknown_scheme_is_configuration_error() {
        let err = CacheBackend::parse("mongodb://localhost").unwrap_err();
        assert!(matches!(err, DbError::Configuration(_)));
        assert!(err.to_string().contains("mongodb"));
    }

    #[test]
    fn test_memcache_without_host_or_path_is_rejected() {
        assert!(matches!(
            CacheBackend::parse("memcache://"),
            Err(DbError::Configuration(_))
        ));
    }

    #[test]
    fn test_disabled_profile_is_never_enabled() {
        let profile = CacheProfile::new(Duration::from_secs(300), "ns_", CacheBackend::Disabled);
        assert!(!profile.is_enabled());
        assert!(!CacheProfile::disabled().is_enabled());
        let profile = CacheProfile::new(Duration::ZERO, "", CacheBackend::Array);
        assert!(profile.is_enabled());
    }

    #[test]
    fn test_display_includes_endpoint() {
        let backend = CacheBackend::parse("redis://localhost").unwrap();
        assert_eq!(backend.to_string(), "redis(localhost:6379)");
        assert_eq!(CacheBackend::Array.to_string(), "array");
    }
}
