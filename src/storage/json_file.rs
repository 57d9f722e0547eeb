//! Flat-file backend
//!
//! The whole object graph lives in one JSON object keyed by
//! `<Class>.<id>`. Every save rewrites the file: the new contents go to a
//! sibling temp file which is fsynced and then renamed over the old one,
//! so a reader sees either the previous graph or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::model::Entity;

use super::backend::{ChangeSet, Snapshot, StorageBackend};
use super::errors::{StorageError, StorageResult};

#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Uses `path` as the store file, creating its parent directory.
    ///
    /// The file itself is created on the first save.
    pub fn open(path: impl Into<PathBuf>) -> StorageResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                StorageError::io_error(
                    format!("Failed to create storage directory: {}", parent.display()),
                    e,
                )
            })?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, bytes: &[u8]) -> StorageResult<()> {
        let temp_path = self.temp_path();

        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(StorageError::write_failed(
                format!("Failed to replace {}", self.path.display()),
                e,
            ));
        }

        // Make the rename itself durable. Not every platform allows
        // opening a directory, so this is best effort.
        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl StorageBackend for JsonFileBackend {
    fn name(&self) -> &'static str {
        "json_file"
    }

    fn load(&mut self) -> StorageResult<Vec<Entity>> {
        let contents = match fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::read_failed(
                    format!("Failed to read {}", self.path.display()),
                    e,
                ))
            }
        };

        let object: Map<String, Value> = serde_json::from_slice(&contents).map_err(|e| {
            StorageError::data_corruption(format!(
                "{} is not a JSON object: {}",
                self.path.display(),
                e
            ))
        })?;

        object
            .into_iter()
            .map(|(key, value)| {
                let entity =
                    Entity::from_stored(value).map_err(|e| StorageError::corrupt_entity(&key, e))?;
                if entity.storage_key() != key {
                    return Err(StorageError::DataCorruption {
                        message: format!("entry stored under wrong key ({})", entity.storage_key()),
                        details: Some(format!("key: {}", key)),
                    });
                }
                Ok(entity)
            })
            .collect()
    }

    fn persist(&mut self, changes: &ChangeSet, snapshot: Snapshot<'_>) -> StorageResult<()> {
        let object: Map<String, Value> = snapshot
            .entities()
            .map(|entity| (entity.storage_key(), entity.to_stored()))
            .collect();

        let bytes = serde_json::to_vec(&object).map_err(|e| {
            StorageError::write_failed_no_source(format!("Failed to encode object graph: {}", e))
        })?;
        self.write_atomically(&bytes)?;

        debug!(
            path = %self.path.display(),
            changes = changes.len(),
            entities = snapshot.len(),
            "rewrote store file"
        );
        Ok(())
    }
}
