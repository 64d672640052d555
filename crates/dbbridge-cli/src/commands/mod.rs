//! CLI subcommands
//!
//! Every command receives the [`Invocation`]: the global configuration layer
//! loaded from disk plus the request layer built from the command-line flags.

pub mod completions;
pub mod config;
pub mod fields;
pub mod query;
pub mod tables;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dbbridge_core::config::{
    ConfigBuilder, ConfigLayer, ExecutionMode, LayeredConfig, ResolvedConfig, DEFAULT_LOG_LEVEL,
};
use dbbridge_core::ports::JsonCodec;
use dbbridge_core::Database;
use dbbridge_driver::Connector;

/// `--mode` values
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    Frontend,
    Backend,
}

impl From<ModeArg> for ExecutionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Frontend => ExecutionMode::Frontend,
            ModeArg::Backend => ExecutionMode::Backend,
        }
    }
}

/// Builds the request-scope layer from the global flags
pub fn request_layer(
    mode: Option<ModeArg>,
    driver: Option<&str>,
    host: Option<&str>,
    database: Option<&str>,
    cache_url: Option<&str>,
) -> ConfigLayer {
    let mut builder = ConfigBuilder::new();
    if let Some(mode) = mode {
        builder = builder.mode(mode.into());
    }
    if let Some(driver) = driver {
        builder = builder.driver(driver);
    }
    if let Some(host) = host {
        builder = builder.host(host);
    }
    if let Some(database) = database {
        builder = builder.database(database);
    }
    if let Some(url) = cache_url {
        builder = builder.cache_url(url);
    }
    builder.build()
}

/// Configuration of one CLI run
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config_path: PathBuf,
    pub global: ConfigLayer,
    pub request: ConfigLayer,
}

impl Invocation {
    /// Loads the global layer
    ///
    /// An explicit `--config` file must exist and parse; the default file is
    /// optional.
    pub fn new(config: Option<&Path>, request: ConfigLayer) -> Result<Self> {
        let (config_path, global) = match config {
            Some(path) => {
                let global = ConfigLayer::load(path).with_context(|| {
                    format!("Failed to load configuration from {}", path.display())
                })?;
                (path.to_path_buf(), global)
            }
            None => {
                let path = ConfigLayer::default_path();
                let global = ConfigLayer::load_or_default(&path);
                (path, global)
            }
        };

        Ok(Self {
            config_path,
            global,
            request,
        })
    }

    pub fn layers(&self) -> LayeredConfig {
        LayeredConfig::new(self.request.clone(), self.global.clone())
    }

    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.layers()
            .resolve(&JsonCodec)
            .context("Invalid configuration")
    }

    /// Connects with the resolved configuration
    pub fn connect(&self) -> Result<Database> {
        let resolved = self.resolve()?;
        Connector::new()
            .connect(&resolved)
            .with_context(|| format!("Failed to connect to '{}'", resolved.connection.database))
    }

    /// Log level before any flag overrides; the request layer never sets one
    pub fn logging_level(&self) -> String {
        self.request
            .logging
            .level
            .clone()
            .or_else(|| self.global.logging.level.clone())
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}
