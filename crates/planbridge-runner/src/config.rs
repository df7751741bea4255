//! Runner configuration
//!
//! Loaded from a YAML file; environment variables always override file
//! values.

use planbridge_sql::DialectKind;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

/// Reference engine connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    pub dialect: DialectKind,
    pub coordinator_uri: String,
    pub user: String,
    pub catalog: String,
    pub schema: String,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            dialect: DialectKind::Presto,
            coordinator_uri: "http://127.0.0.1:8080".to_string(),
            user: "planbridge".to_string(),
            catalog: "hive".to_string(),
            schema: "tpch".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl ReferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Endpoint new statements are posted to.
    pub fn statement_uri(&self) -> String {
        format!("{}/v1/statement", self.coordinator_uri.trim_end_matches('/'))
    }

    /// Headers sent with every new statement.
    pub fn statement_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-Presto-User", self.user.clone()),
            ("X-Presto-Catalog", self.catalog.clone()),
            ("X-Presto-Schema", self.schema.clone()),
            ("Content-Type", "text/plain".to_string()),
        ]
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or module-specific
    pub level: String,

    /// Output format: pretty, json, compact
    pub format: String,

    /// Output destination: stdout, file, both
    pub output: String,

    /// Directory for log files
    pub directory: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            output: "stdout".to_string(),
            directory: "./logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reference: ReferenceConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from YAML file with environment variable overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Override settings from `lookup`, normally the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dialect) = lookup("PLANBRIDGE_DIALECT") {
            self.reference.dialect = dialect.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PLANBRIDGE_DIALECT",
                value: dialect.clone(),
            })?;
        }
        if let Some(uri) = lookup("PLANBRIDGE_COORDINATOR_URI") {
            self.reference.coordinator_uri = uri;
        }
        if let Some(user) = lookup("PLANBRIDGE_USER") {
            self.reference.user = user;
        }
        if let Some(timeout) = lookup("PLANBRIDGE_TIMEOUT_MS") {
            self.reference.timeout_ms = timeout.parse().map_err(|_| ConfigError::InvalidValue {
                name: "PLANBRIDGE_TIMEOUT_MS",
                value: timeout.clone(),
            })?;
        }

        if let Some(level) = lookup("RUST_LOG") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            self.logging.format = format;
        }
        if let Some(output) = lookup("LOG_OUTPUT") {
            self.logging.output = output;
        }
        if let Some(dir) = lookup("LOG_DIR") {
            self.logging.directory = dir;
        }
        Ok(())
    }
}
