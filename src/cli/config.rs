//! Application configuration
//!
//! Loaded from a JSON file; every field has a default, so `{}` is a valid
//! config. Command-line flags and their environment variables are applied
//! on top before validation.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::http_server::HttpServerConfig;
use crate::observability::{LogSettings, DEFAULT_LOG_FILTER};
use crate::storage::StorageConfig;

use super::args::ConfigArgs;
use super::errors::{CliError, CliResult};

/// Config file read when `--config` is not given, if it exists
pub const DEFAULT_CONFIG_PATH: &str = "./hbnb.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// `tracing` filter directive (default: "info,tower_http=info")
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub log_json: bool,
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpServerConfig::default(),
            storage: StorageConfig::default(),
            log_filter: default_log_filter(),
            log_json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {:?}: {}", path, e))
        })?;

        serde_json::from_str(&content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))
    }

    /// Resolves the effective configuration for a command.
    ///
    /// An explicit `--config` must exist; the default path is optional.
    pub fn resolve(args: &ConfigArgs) -> CliResult<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    Self::load(&default)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_overrides(args);
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, args: &ConfigArgs) {
        if let Some(host) = &args.host {
            self.http.host = host.clone();
        }
        if let Some(port) = args.port {
            self.http.port = port;
        }
        if let Some(backend) = args.storage {
            self.storage.backend = backend;
        }
        if let Some(path) = &args.path {
            self.storage.path = path.clone();
        }
    }

    pub fn validate(&self) -> CliResult<()> {
        if self.http.port == 0 {
            return Err(CliError::config_error("http.port must be > 0"));
        }

        if self.http.host.trim().is_empty() {
            return Err(CliError::config_error("http.host must not be empty"));
        }

        if self.storage.backend.is_durable() && self.storage.path.as_os_str().is_empty() {
            return Err(CliError::config_error(format!(
                "storage.path is required for the '{}' backend",
                self.storage.backend
            )));
        }

        Ok(())
    }

    pub fn log_settings(&self) -> LogSettings {
        LogSettings {
            filter: self.log_filter.clone(),
            json: self.log_json,
        }
    }
}
