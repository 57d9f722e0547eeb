//! Non-durable backend. Keeps what was "persisted" so a reload sees it.

use std::collections::BTreeMap;

use crate::model::Entity;

use super::backend::{Change, ChangeSet, Snapshot, StorageBackend};
use super::errors::StorageResult;

#[derive(Debug, Default)]
pub struct MemoryBackend {
    persisted: BTreeMap<String, Entity>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&mut self) -> StorageResult<Vec<Entity>> {
        Ok(self.persisted.values().cloned().collect())
    }

    fn persist(&mut self, changes: &ChangeSet, _snapshot: Snapshot<'_>) -> StorageResult<()> {
        for (key, change) in changes.iter() {
            match change {
                Change::Upsert(entity) => {
                    self.persisted.insert(key.to_string(), entity.clone());
                }
                Change::Delete => {
                    self.persisted.remove(key);
                }
            }
        }
        Ok(())
    }
}
