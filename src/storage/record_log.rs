//! Append-only record log backend
//!
//! Each save appends one checksummed [`CommitRecord`] holding every change
//! of that save, then fsyncs. Loading replays commits in file order; for a
//! given key the latest commit wins and a delete leaves a tombstone.
//!
//! - Checksum verified on every record at load
//! - Any corruption or truncation fails the load; nothing is skipped
//! - A failed append truncates the file back to its previous length

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::model::Entity;

use super::backend::{ChangeSet, Snapshot, StorageBackend};
use super::errors::{StorageError, StorageResult};
use super::record::{ChangeEntry, CommitRecord, MIN_RECORD_SIZE};

#[derive(Debug)]
pub struct RecordLogBackend {
    path: PathBuf,
    /// Append handle, opened by `load`
    file: Option<File>,
    next_sequence: u64,
}

impl RecordLogBackend {
    /// Uses `path` as the log file, creating its parent directory.
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
        Ok(Self {
            path,
            file: None,
            next_sequence: 1,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sequence number the next commit will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    fn append_handle(&mut self) -> StorageResult<&mut File> {
        if self.file.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .map_err(|e| {
                    StorageError::write_failed(
                        format!("Failed to open record log: {}", self.path.display()),
                        e,
                    )
                })?;
            self.file = Some(file);
        }
        self.file
            .as_mut()
            .ok_or_else(|| StorageError::write_failed_no_source("record log handle unavailable"))
    }

    /// Replays every commit in `data`, returning the latest stored form per key.
    fn replay(data: &[u8]) -> StorageResult<(BTreeMap<String, Value>, u64)> {
        let mut live: BTreeMap<String, Value> = BTreeMap::new();
        let mut offset = 0usize;
        let mut last_sequence = 0u64;

        while offset < data.len() {
            let remaining = data.len() - offset;
            if remaining < MIN_RECORD_SIZE {
                return Err(StorageError::corruption_at_offset(
                    offset as u64,
                    format!(
                        "Truncated log: {} bytes remaining, minimum record size is {}",
                        remaining, MIN_RECORD_SIZE
                    ),
                ));
            }

            let (record, consumed) = CommitRecord::deserialize(&data[offset..])
                .map_err(|e| StorageError::corruption_at_offset(offset as u64, e.to_string()))?;

            if record.sequence <= last_sequence {
                return Err(StorageError::corruption_at_offset(
                    offset as u64,
                    format!(
                        "Sequence {} does not follow {}",
                        record.sequence, last_sequence
                    ),
                ));
            }
            last_sequence = record.sequence;

            for entry in record.entries {
                match entry {
                    ChangeEntry::Upsert { key, entity } => {
                        live.insert(key, entity);
                    }
                    ChangeEntry::Delete { key } => {
                        live.remove(&key);
                    }
                }
            }
            offset += consumed;
        }

        Ok((live, last_sequence))
    }
}

impl StorageBackend for RecordLogBackend {
    fn name(&self) -> &'static str {
        "record_log"
    }

    fn load(&mut self) -> StorageResult<Vec<Entity>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(StorageError::read_failed(
                    format!("Failed to read record log: {}", self.path.display()),
                    e,
                ))
            }
        };

        let (live, last_sequence) = Self::replay(&data)?;
        self.next_sequence = last_sequence + 1;
        self.file = None;

        debug!(
            path = %self.path.display(),
            bytes = data.len(),
            commits = last_sequence,
            "replayed record log"
        );

        live.into_iter()
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

    fn persist(&mut self, changes: &ChangeSet, _snapshot: Snapshot<'_>) -> StorageResult<()> {
        if changes.is_empty() {
            return Ok(());
        }

        let sequence = self.next_sequence;
        let record = CommitRecord::new(sequence, changes.to_entries());
        let bytes = record.serialize().map_err(|e| {
            StorageError::write_failed(format!("Failed to encode commit {}", sequence), e)
        })?;

        let path = self.path.clone();
        let file = self.append_handle()?;
        let previous_len = file
            .metadata()
            .map_err(|e| StorageError::io_error("Failed to read record log metadata", e))?
            .len();

        let written = file.write_all(&bytes).and_then(|()| file.sync_all());
        if let Err(e) = written {
            // Drop the torn tail so the next load still sees a valid log.
            if let Err(truncate_err) = file.set_len(previous_len).and_then(|()| file.sync_all()) {
                warn!(
                    path = %path.display(),
                    error = %truncate_err,
                    "failed to truncate torn commit"
                );
            }
            self.file = None;
            return Err(StorageError::write_failed(
                format!("Failed to append commit {}", sequence),
                e,
            ));
        }

        self.next_sequence += 1;
        Ok(())
    }
}
