//! Connection setup
//!
//! The [`Connector`] turns a resolved configuration into a ready
//! [`Database`]: it runs the pre-connect hooks, opens the SQL connection,
//! runs the post-connect hooks and attaches the configured result cache.

use std::sync::Arc;

use dbbridge_core::config::{LayeredConfig, ResolvedConfig};
use dbbridge_core::domain::DbError;
use dbbridge_core::ports::{
    IPostConnectHook, IPreConnectHook, ISqlConnection, IValueCodec, JsonCodec,
};
use dbbridge_core::{Database, QueryCache};

use crate::connection::SqlxConnection;

/// Builds [`Database`] handles from configuration
pub struct Connector {
    codec: Arc<dyn IValueCodec>,
    pre_connect: Vec<Arc<dyn IPreConnectHook>>,
    post_connect: Vec<Arc<dyn IPostConnectHook>>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Connector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connector")
            .field("pre_connect", &self.pre_connect.len())
            .field("post_connect", &self.post_connect.len())
            .finish()
    }
}

impl Connector {
    /// A connector with the JSON codec and no hooks
    pub fn new() -> Self {
        Self {
            codec: Arc::new(JsonCodec),
            pre_connect: Vec::new(),
            post_connect: Vec::new(),
        }
    }

    /// Replaces the codec used for driver options and composite bind values
    pub fn with_codec(mut self, codec: Arc<dyn IValueCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Registers a hook that may rewrite parameters before connecting
    pub fn pre_connect(mut self, hook: Arc<dyn IPreConnectHook>) -> Self {
        self.pre_connect.push(hook);
        self
    }

    /// Registers a hook that runs once the connection is open
    pub fn post_connect(mut self, hook: Arc<dyn IPostConnectHook>) -> Self {
        self.post_connect.push(hook);
        self
    }

    pub fn codec(&self) -> &Arc<dyn IValueCodec> {
        &self.codec
    }

    /// Resolves `layers` with this connector's codec, then connects
    pub fn connect_layered(&self, layers: &LayeredConfig) -> Result<Database, DbError> {
        let resolved = layers.resolve(self.codec.as_ref())?;
        self.connect(&resolved)
    }

    /// Opens a connection for `config`
    ///
    /// Hooks run in registration order and the first hook error aborts the
    /// connect. A cache store that cannot be opened is logged and the
    /// database runs uncached.
    ///
    /// # Errors
    ///
    /// Hook errors, and [`DbError::Backend`] when the connection fails.
    pub fn connect(&self, config: &ResolvedConfig) -> Result<Database, DbError> {
        let mut params = config.connection.clone();
        for (position, hook) in self.pre_connect.iter().enumerate() {
            tracing::debug!(position, "Running pre-connect hook");
            hook.before_connect(&mut params)?;
        }

        let connection = Arc::new(SqlxConnection::open(&params)?);

        for (position, hook) in self.post_connect.iter().enumerate() {
            tracing::debug!(position, "Running post-connect hook");
            if let Err(e) = hook.after_connect(&params, connection.as_ref()) {
                connection.close();
                return Err(e);
            }
        }

        let query_cache = match dbbridge_cache::open_store(&config.cache.backend) {
            Ok(store) => store.map(|store| QueryCache::new(config.cache.clone(), store)),
            Err(e) => {
                tracing::warn!(
                    backend = %config.cache.backend,
                    error = %e,
                    "Result cache unavailable, running uncached"
                );
                None
            }
        };

        tracing::info!(
            driver = %params.driver,
            database = %params.database,
            cache = %config.cache.backend,
            "Database ready"
        );

        let connection: Arc<dyn ISqlConnection> = connection;
        Ok(Database::new(
            connection,
            Arc::clone(&self.codec),
            query_cache,
            params.database,
        ))
    }
}
