//! redis result store

use std::sync::Mutex;
use std::time::Duration;

use dbbridge_core::domain::{CacheEndpoint, DbError};
use dbbridge_core::ports::IResultCache;

/// Result store backed by a redis server (`redis://`)
///
/// Commands go over a single blocking connection guarded by a mutex.
pub struct RedisStore {
    connection: Mutex<redis::Connection>,
    endpoint: CacheEndpoint,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl RedisStore {
    /// Connects to the server at `endpoint`
    ///
    /// # Errors
    ///
    /// [`DbError::Cache`] for an unusable address or an unreachable server.
    pub fn connect(endpoint: &CacheEndpoint) -> Result<Self, DbError> {
        let client = redis::Client::open(connection_url(endpoint))
            .map_err(|e| DbError::Cache(format!("Invalid redis address {}: {}", endpoint, e)))?;
        let connection = client
            .get_connection()
            .map_err(|e| DbError::Cache(format!("redis {}: {}", endpoint, e)))?;

        tracing::debug!(%endpoint, "Connected to redis");
        Ok(Self {
            connection: Mutex::new(connection),
            endpoint: endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &CacheEndpoint {
        &self.endpoint
    }

    fn run<T: redis::FromRedisValue>(&self, cmd: &redis::Cmd) -> Result<T, DbError> {
        let mut connection = self
            .connection
            .lock()
            .map_err(|_| DbError::Cache(format!("redis {}: connection poisoned", self.endpoint)))?;
        cmd.query(&mut *connection)
            .map_err(|e| DbError::Cache(format!("redis {}: {}", self.endpoint, e)))
    }
}

pub(crate) fn connection_url(endpoint: &CacheEndpoint) -> String {
    match endpoint {
        CacheEndpoint::Tcp { host, port } => format!("redis://{}:{}/", host, port),
        CacheEndpoint::Socket(path) => format!("redis+unix://{}", path.display()),
    }
}

impl IResultCache for RedisStore {
    fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, DbError> {
        self.run(redis::cmd("GET").arg(key))
    }

    fn save(&self, key: &str, data: &[u8], ttl: Duration) -> Result<(), DbError> {
        if ttl.is_zero() {
            self.run(redis::cmd("SET").arg(key).arg(data))
        } else {
            // SETEX has whole-second resolution and rejects 0
            let seconds = ttl.as_secs().max(1);
            self.run(redis::cmd("SETEX").arg(key).arg(seconds).arg(data))
        }
    }

    fn delete(&self, key: &str) -> Result<(), DbError> {
        self.run::<i64>(redis::cmd("DEL").arg(key)).map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
