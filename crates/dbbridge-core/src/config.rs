//! Configuration module for dbbridge.
//!
//! Configuration comes in layers that share one shape, [`ConfigLayer`], with
//! every field optional: a request-scope layer (CLI flags, per-request
//! overrides) and a global layer (the YAML file). [`LayeredConfig::resolve`]
//! flattens them once, field by field, falling back to hard defaults, into a
//! [`ResolvedConfig`]. Nothing is looked up ambiently after that.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{CacheBackend, CacheProfile, DbError};
use crate::ports::IValueCodec;

// ---------------------------------------------------------------------------
// Hard defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_DRIVER: &str = "mysql";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_USER: &str = "root";
pub const DEFAULT_CHARSET: &str = "utf8mb4";
pub const DEFAULT_LOG_LEVEL: &str = "info";
/// Cache TTL in backend (administration) mode, in seconds
pub const DEFAULT_BACKEND_TTL: u64 = 1;
/// Cache TTL in frontend mode, in seconds
pub const DEFAULT_FRONTEND_TTL: u64 = 60;

// ---------------------------------------------------------------------------
// Layers
// ---------------------------------------------------------------------------

/// Execution mode; selects the default cache TTL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Frontend,
    Backend,
}

impl ExecutionMode {
    pub fn default_ttl(&self) -> Duration {
        match self {
            ExecutionMode::Frontend => Duration::from_secs(DEFAULT_FRONTEND_TTL),
            ExecutionMode::Backend => Duration::from_secs(DEFAULT_BACKEND_TTL),
        }
    }
}

/// Database connection settings of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseLayer {
    /// `mysql`, `mysqli`, `doctrinemysql` or `sqlite`.
    pub driver: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Database name, or the file path for `sqlite`.
    pub database: Option<String>,
    pub charset: Option<String>,
    /// Local socket path; takes precedence over host/port.
    pub socket: Option<String>,
    /// Serialized map of native driver options.
    pub driver_options: Option<String>,
}

/// Query cache settings of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLayer {
    /// Backend selector URL; empty disables caching.
    pub url: Option<String>,
    /// Time-to-live in seconds.
    pub ttl: Option<u64>,
    /// Prefix for every cache key.
    pub namespace: Option<String>,
}

/// Logging settings of one layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingLayer {
    /// `trace`, `debug`, `info`, `warn` or `error`.
    pub level: Option<String>,
}

/// One configuration layer; unset fields defer to the next layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigLayer {
    pub mode: Option<ExecutionMode>,
    pub database: DatabaseLayer,
    pub cache: CacheLayer,
    pub logging: LoggingLayer,
}

impl ConfigLayer {
    /// Load a layer from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let layer: ConfigLayer = serde_yaml::from_str(&content)?;
        Ok(layer)
    }

    /// Try to load from `path`; fall back to an empty layer on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/dbbridge/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("dbbridge")
            .join("config.yaml")
    }
}

/// Request-scope and global layers, resolved in that order.
#[derive(Debug, Clone, Default)]
pub struct LayeredConfig {
    pub request: ConfigLayer,
    pub global: ConfigLayer,
}

// ---------------------------------------------------------------------------
// Resolved configuration
// ---------------------------------------------------------------------------

/// SQL driver family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    MySql,
    Sqlite,
}

impl Driver {
    /// Maps a configured driver name to a driver family
    ///
    /// # Errors
    ///
    /// [`DbError::Configuration`] for unknown names.
    pub fn from_name(name: &str) -> Result<Self, DbError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mysqli" | "doctrinemysql" => Ok(Driver::MySql),
            "sqlite" => Ok(Driver::Sqlite),
            _ => Err(DbError::Configuration(format!(
                "Database driver {} not known",
                name
            ))),
        }
    }
}

impl Display for Driver {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Driver::MySql => write!(f, "mysql"),
            Driver::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Fully resolved connection parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionParams {
    pub driver: Driver,
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub charset: String,
    pub socket: Option<PathBuf>,
    pub driver_options: BTreeMap<String, String>,
}

/// The flat result of resolving a [`LayeredConfig`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub mode: ExecutionMode,
    pub connection: ConnectionParams,
    pub cache: CacheProfile,
    pub logging_level: String,
}

/// Picks the first layer value that is set
macro_rules! first_set {
    ($layers:expr, $($field:tt).+) => {
        $layers.iter().find_map(|layer| layer.$($field).+.clone())
    };
}

impl LayeredConfig {
    pub fn new(request: ConfigLayer, global: ConfigLayer) -> Self {
        Self { request, global }
    }

    /// Resolves every field as request, then global, then hard default
    ///
    /// `codec` decodes the `driver_options` blob.
    ///
    /// # Errors
    ///
    /// [`DbError::Configuration`] for an unknown driver, an unknown cache
    /// scheme or a `driver_options` blob that is not a map.
    pub fn resolve(&self, codec: &dyn IValueCodec) -> Result<ResolvedConfig, DbError> {
        let layers = [&self.request, &self.global];

        let mode = first_set!(layers, mode).unwrap_or_default();

        let driver_name =
            first_set!(layers, database.driver).unwrap_or_else(|| DEFAULT_DRIVER.to_string());
        let driver = Driver::from_name(&driver_name)?;

        let database = first_set!(layers, database.database).unwrap_or_default();

        let driver_options = match first_set!(layers, database.driver_options) {
            Some(blob) if !blob.trim().is_empty() => decode_driver_options(codec, &blob)?,
            _ => BTreeMap::new(),
        };

        let connection = ConnectionParams {
            driver,
            host: first_set!(layers, database.host).unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: first_set!(layers, database.port).unwrap_or(DEFAULT_PORT),
            user: first_set!(layers, database.user).unwrap_or_else(|| DEFAULT_USER.to_string()),
            password: first_set!(layers, database.password).unwrap_or_default(),
            charset: first_set!(layers, database.charset)
                .unwrap_or_else(|| DEFAULT_CHARSET.to_string()),
            socket: first_set!(layers, database.socket)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            database,
            driver_options,
        };

        let backend = CacheBackend::parse(&first_set!(layers, cache.url).unwrap_or_default())?;
        let ttl = first_set!(layers, cache.ttl)
            .map(Duration::from_secs)
            .unwrap_or_else(|| mode.default_ttl());
        let namespace = first_set!(layers, cache.namespace)
            .unwrap_or_else(|| format!("dbbridge_{}_", connection.database));

        Ok(ResolvedConfig {
            mode,
            cache: CacheProfile::new(ttl, namespace, backend),
            logging_level: first_set!(layers, logging.level)
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            connection,
        })
    }
}

fn decode_driver_options(
    codec: &dyn IValueCodec,
    blob: &str,
) -> Result<BTreeMap<String, String>, DbError> {
    let value = codec.decode(blob).map_err(|e| {
        DbError::Configuration(format!("Invalid driver_options: {}", e))
    })?;

    let serde_json::Value::Object(map) = value else {
        return Err(DbError::Configuration(
            "driver_options must be a serialized map".to_string(),
        ));
    };

    Ok(map
        .into_iter()
        .map(|(k, v)| {
            let v = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, v)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"database.port"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl ResolvedConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let conn = &self.connection;

        if conn.driver == Driver::MySql {
            if conn.socket.is_none() && conn.host.trim().is_empty() {
                errors.push(ValidationError {
                    field: "database.host".into(),
                    message: "must not be empty unless a socket is set".into(),
                });
            }
            if conn.port == 0 {
                errors.push(ValidationError {
                    field: "database.port".into(),
                    message: "must be greater than 0".into(),
                });
            }
        }

        if conn.driver == Driver::Sqlite && conn.database.trim().is_empty() {
            errors.push(ValidationError {
                field: "database.database".into(),
                message: "sqlite needs a file path or :memory:".into(),
            });
        }

        if !VALID_LOG_LEVELS.contains(&self.logging_level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging_level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`ConfigLayer`] programmatically.
///
/// # Example
///
/// ```rust
/// use dbbridge_core::config::{ConfigBuilder, LayeredConfig};
/// use dbbridge_core::ports::JsonCodec;
///
/// let request = ConfigBuilder::new()
///     .driver("sqlite")
///     .database(":memory:")
///     .cache_url("array://")
///     .build();
/// let resolved = LayeredConfig::new(request, Default::default())
///     .resolve(&JsonCodec)
///     .unwrap();
/// assert_eq!(resolved.cache.backend.name(), "array");
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    layer: ConfigLayer,
}

impl ConfigBuilder {
    /// Create a new builder with every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: ExecutionMode) -> Self {
        self.layer.mode = Some(mode);
        self
    }

    // --- database ---

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.layer.database.driver = Some(driver.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.layer.database.host = Some(host.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.layer.database.port = Some(port);
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.layer.database.user = Some(user.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.layer.database.password = Some(password.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.layer.database.database = Some(database.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.layer.database.charset = Some(charset.into());
        self
    }

    pub fn socket(mut self, socket: impl Into<String>) -> Self {
        self.layer.database.socket = Some(socket.into());
        self
    }

    pub fn driver_options(mut self, blob: impl Into<String>) -> Self {
        self.layer.database.driver_options = Some(blob.into());
        self
    }

    // --- cache ---

    pub fn cache_url(mut self, url: impl Into<String>) -> Self {
        self.layer.cache.url = Some(url.into());
        self
    }

    pub fn cache_ttl(mut self, seconds: u64) -> Self {
        self.layer.cache.ttl = Some(seconds);
        self
    }

    pub fn cache_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.layer.cache.namespace = Some(namespace.into());
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.layer.logging.level = Some(level.into());
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`ConfigLayer`].
    pub fn build(self) -> ConfigLayer {
        self.layer
    }
}
