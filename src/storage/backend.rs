//! # Storage Backend Trait
//!
//! The engine keeps the live object graph in memory; a backend only loads
//! it at open time and makes pending changes durable on `save()`.

use std::collections::BTreeMap;

use crate::model::{storage_key, Entity, EntityKind};

use super::errors::StorageResult;
use super::record::ChangeEntry;

/// In-memory index: kind -> id -> entity
pub(crate) type Index = BTreeMap<EntityKind, BTreeMap<String, Entity>>;

/// A pending change for one storage key.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Upsert(Entity),
    Delete,
}

/// Changes registered since the last successful save, keyed by storage key.
///
/// Later changes to the same key replace earlier ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    changes: BTreeMap<String, Change>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_upsert(&mut self, entity: Entity) {
        self.changes.insert(entity.storage_key(), Change::Upsert(entity));
    }

    pub fn record_delete(&mut self, kind: EntityKind, id: &str) {
        self.changes.insert(storage_key(kind, id), Change::Delete);
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Change)> {
        self.changes.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Wire form used by the record log.
    pub fn to_entries(&self) -> Vec<ChangeEntry> {
        self.iter()
            .map(|(key, change)| match change {
                Change::Upsert(entity) => ChangeEntry::Upsert {
                    key: key.to_string(),
                    entity: entity.to_stored(),
                },
                Change::Delete => ChangeEntry::Delete {
                    key: key.to_string(),
                },
            })
            .collect()
    }
}

/// Read-only view of the whole live object graph at save time.
#[derive(Clone, Copy)]
pub struct Snapshot<'a> {
    index: &'a Index,
}

impl<'a> Snapshot<'a> {
    pub(crate) fn new(index: &'a Index) -> Self {
        Self { index }
    }

    /// Every live entity, kinds in declaration order, ids ascending.
    pub fn entities(&self) -> impl Iterator<Item = &'a Entity> + 'a {
        self.index.values().flat_map(|by_id| by_id.values())
    }

    pub fn len(&self) -> usize {
        self.index.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Durable medium behind the storage engine.
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Short backend name for logs (`json_file`, `record_log`, `memory`)
    fn name(&self) -> &'static str;

    /// Read every persisted entity.
    fn load(&mut self) -> StorageResult<Vec<Entity>>;

    /// Make `changes` durable. `snapshot` is the full live graph including
    /// those changes, for backends that rewrite everything.
    ///
    /// Must be atomic per call: on error nothing from `changes` is visible
    /// to a later `load`.
    fn persist(&mut self, changes: &ChangeSet, snapshot: Snapshot<'_>) -> StorageResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    #[test]
    fn test_later_change_wins() {
        let entity = Entity::new(EntityKind::State, Map::new());
        let mut changes = ChangeSet::new();
        changes.record_upsert(entity.clone());
        changes.record_delete(EntityKind::State, entity.id());

        assert_eq!(changes.len(), 1);
        let (key, change) = changes.iter().next().unwrap();
        assert_eq!(key, entity.storage_key());
        assert_eq!(change, &Change::Delete);
    }

    #[test]
    fn test_snapshot_orders_parents_first() {
        let mut index = Index::new();
        let city = Entity::new(EntityKind::City, Map::new());
        let state = Entity::new(EntityKind::State, Map::new());
        index
            .entry(EntityKind::City)
            .or_default()
            .insert(city.id().to_string(), city);
        index
            .entry(EntityKind::State)
            .or_default()
            .insert(state.id().to_string(), state);

        let snapshot = Snapshot::new(&index);
        let kinds: Vec<_> = snapshot.entities().map(Entity::kind).collect();
        assert_eq!(kinds, vec![EntityKind::State, EntityKind::City]);
        assert_eq!(snapshot.len(), 2);
    }
}
