//! Config command - View and manage dbbridge configuration
//!
//! Provides the `dbbridge config` CLI command which:
//! 1. Shows the resolved configuration (YAML or JSON)
//! 2. Sets individual values of the configuration file via dot-notation keys
//! 3. Validates the resolved configuration and reports errors

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use dbbridge_core::config::{ConfigLayer, ExecutionMode, LayeredConfig, ResolvedConfig};
use dbbridge_core::ports::JsonCodec;
use tracing::info;

use super::Invocation;
use crate::output::{get_formatter, OutputFormat};

/// Keys accepted by `config set`
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("mode", "frontend|backend"),
    ("database.driver", "mysql|mysqli|doctrinemysql|sqlite"),
    ("database.host", "Database host"),
    ("database.port", "Database port"),
    ("database.user", "Database user"),
    ("database.password", "Database password"),
    ("database.database", "Database name, or file path for sqlite"),
    ("database.charset", "Connection charset"),
    ("database.socket", "Local socket path"),
    ("database.driver_options", "Serialized map of native driver options"),
    ("cache.url", "Cache backend URL, empty disables caching"),
    ("cache.ttl", "Cache time-to-live in seconds"),
    ("cache.namespace", "Cache key prefix"),
    ("logging.level", "trace|debug|info|warn|error"),
];

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved configuration
    Show,
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "cache.url")
        key: String,
        /// New value
        value: String,
    },
    /// Validate the resolved configuration
    Validate,
}

impl ConfigCommand {
    pub fn execute(&self, invocation: &Invocation, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(invocation, format),
            ConfigCommand::Set { key, value } => execute_set(invocation, key, value, format),
            ConfigCommand::Validate => execute_validate(invocation, format),
        }
    }
}

fn execute_show(invocation: &Invocation, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let resolved = invocation.resolve()?;

    info!(config_path = %invocation.config_path.display(), "Showing configuration");

    let json = resolved_to_json(&resolved)?;
    if format.is_json() {
        formatter.print_json(&json);
    } else {
        formatter.success(&format!(
            "Configuration ({})",
            invocation.config_path.display()
        ));
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&json).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

/// JSON view of a resolved configuration; the password is never included
fn resolved_to_json(resolved: &ResolvedConfig) -> Result<serde_json::Value> {
    Ok(serde_json::json!({
        "mode": resolved.mode,
        "database": serde_json::to_value(&resolved.connection)
            .context("Failed to serialize connection parameters")?,
        "cache": {
            "backend": resolved.cache.backend.name(),
            "ttl": resolved.cache.ttl.as_secs(),
            "namespace": resolved.cache.namespace,
        },
        "logging": { "level": resolved.logging_level },
    }))
}

fn execute_set(invocation: &Invocation, key: &str, value: &str, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let config_path = &invocation.config_path;
    let mut layer = ConfigLayer::load_or_default(config_path);

    info!(key = %key, "Setting configuration value");

    if let Err(e) = apply_config_value(&mut layer, key, value) {
        if format.is_json() {
            let json = serde_json::json!({
                "success": false,
                "key": key,
                "error": e.to_string(),
            });
            formatter.print_json(&json);
        } else {
            formatter.error(&format!("Failed to set '{}': {}", key, e));
            formatter.info("");
            formatter.info("Supported keys:");
            for (name, help) in SUPPORTED_KEYS {
                formatter.info(&format!("  {:<26} - {}", name, help));
            }
        }
        return Ok(());
    }

    // The file layer alone must still resolve and validate
    let errors = match LayeredConfig::new(ConfigLayer::default(), layer.clone()).resolve(&JsonCodec) {
        Ok(resolved) => resolved.validate().iter().map(|e| e.to_string()).collect(),
        Err(e) => vec![e.to_string()],
    };
    if !errors.is_empty() {
        if format.is_json() {
            let json = serde_json::json!({
                "success": false,
                "key": key,
                "errors": errors,
            });
            formatter.print_json(&json);
        } else {
            formatter.error(&format!("Invalid value for '{}': {}", key, errors.join("; ")));
        }
        return Ok(());
    }

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(&layer).context("Failed to serialize configuration")?;
    std::fs::write(config_path, &yaml).context("Failed to write configuration file")?;

    if format.is_json() {
        let json = serde_json::json!({
            "success": true,
            "key": key,
            "config_path": config_path.display().to_string(),
        });
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Set {}", key));
        formatter.info(&format!("Saved to {}", config_path.display()));
    }

    Ok(())
}

fn execute_validate(invocation: &Invocation, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    info!(config_path = %invocation.config_path.display(), "Validating configuration");

    let errors: Vec<String> = match invocation.layers().resolve(&JsonCodec) {
        Ok(resolved) => resolved.validate().iter().map(|e| e.to_string()).collect(),
        Err(e) => vec![e.to_string()],
    };

    if format.is_json() {
        let json = serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": invocation.config_path.display().to_string(),
            "errors": errors,
        });
        formatter.print_json(&json);
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", invocation.config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", invocation.config_path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {}", error));
        }
    }

    Ok(())
}

/// Apply a dot-notation key/value pair to a configuration layer
///
/// An empty value unsets the key so it falls back to the default.
fn apply_config_value(layer: &mut ConfigLayer, key: &str, value: &str) -> Result<()> {
    let text = || (!value.is_empty()).then(|| value.to_string());

    match key {
        "mode" => {
            layer.mode = match value {
                "" => None,
                "frontend" => Some(ExecutionMode::Frontend),
                "backend" => Some(ExecutionMode::Backend),
                other => bail!("Unknown mode '{}', expected frontend or backend", other),
            };
        }

        // --- database ---
        "database.driver" => layer.database.driver = text(),
        "database.host" => layer.database.host = text(),
        "database.port" => {
            layer.database.port = if value.is_empty() {
                None
            } else {
                Some(
                    value
                        .parse::<u16>()
                        .context("Expected a port number for database.port")?,
                )
            };
        }
        "database.user" => layer.database.user = text(),
        "database.password" => layer.database.password = text(),
        "database.database" => layer.database.database = text(),
        "database.charset" => layer.database.charset = text(),
        "database.socket" => layer.database.socket = text(),
        "database.driver_options" => layer.database.driver_options = text(),

        // --- cache ---
        // An empty URL is kept: it disables caching even if a lower layer enables it
        "cache.url" => layer.cache.url = Some(value.to_string()),
        "cache.ttl" => {
            layer.cache.ttl = if value.is_empty() {
                None
            } else {
                Some(
                    value
                        .parse::<u64>()
                        .context("Expected a number of seconds for cache.ttl")?,
                )
            };
        }
        "cache.namespace" => layer.cache.namespace = text(),

        // --- logging ---
        "logging.level" => layer.logging.level = text(),

        _ => bail!("Unknown configuration key '{}'", key),
    }

    Ok(())
}
