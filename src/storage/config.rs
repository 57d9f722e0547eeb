//! Storage configuration and backend selection.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::backend::StorageBackend;
use super::errors::StorageResult;
use super::json_file::JsonFileBackend;
use super::memory::MemoryBackend;
use super::record_log::RecordLogBackend;

/// Which [`StorageBackend`] to open at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    JsonFile,
    RecordLog,
    Memory,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::JsonFile => "json_file",
            BackendKind::RecordLog => "record_log",
            BackendKind::Memory => "memory",
        }
    }

    /// Whether data survives a restart.
    pub fn is_durable(&self) -> bool {
        !matches!(self, BackendKind::Memory)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json_file" | "file" => Ok(BackendKind::JsonFile),
            "record_log" | "log" => Ok(BackendKind::RecordLog),
            "memory" => Ok(BackendKind::Memory),
            other => Err(format!(
                "unknown storage backend '{}' (expected json_file, record_log or memory)",
                other
            )),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Backend to open (default: "json_file")
    #[serde(default = "default_backend")]
    pub backend: BackendKind,

    /// Store file for durable backends (default: "./file.json")
    #[serde(default = "default_path")]
    pub path: PathBuf,
}

fn default_backend() -> BackendKind {
    BackendKind::JsonFile
}

fn default_path() -> PathBuf {
    PathBuf::from("file.json")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_path(),
        }
    }
}

impl StorageConfig {
    /// Opens the configured backend. Nothing is loaded yet.
    pub fn open_backend(&self) -> StorageResult<Box<dyn StorageBackend>> {
        Ok(match self.backend {
            BackendKind::JsonFile => Box::new(JsonFileBackend::open(&self.path)?),
            BackendKind::RecordLog => Box::new(RecordLogBackend::open(&self.path)?),
            BackendKind::Memory => Box::new(MemoryBackend::new()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        assert_eq!("json_file".parse::<BackendKind>(), Ok(BackendKind::JsonFile));
        assert_eq!("file".parse::<BackendKind>(), Ok(BackendKind::JsonFile));
        assert_eq!("record_log".parse::<BackendKind>(), Ok(BackendKind::RecordLog));
        assert!("db".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_config_defaults_from_empty_json() {
        let config: StorageConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.backend, BackendKind::JsonFile);
        assert_eq!(config.path, PathBuf::from("file.json"));
    }

    #[test]
    fn test_open_selects_backend() {
        let config = StorageConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        };
        let backend = config.open_backend().unwrap();
        assert_eq!(backend.name(), "memory");
    }
}
