//! Storage engine
//!
//! Sole owner of entity lifetime. Holds the live object graph in an
//! in-memory index and remembers, for every entry changed since the last
//! save, the version that was last made durable.
//!
//! # Locking
//!
//! - `state` (RwLock): index plus unsaved entries. Mutations, `write`
//!   batches and `save` take it for writing; lookups take it for reading
//!   and return owned clones.
//! - `backend` (Mutex): only ever taken while `state` is write-locked, so
//!   saves never interleave.
//!
//! A failed save puts every unsaved entry back to its last durable version,
//! so the index never shows what the backend refused.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, error, info};

use crate::model::{Entity, EntityKind};

use super::backend::{ChangeSet, Index, Snapshot, StorageBackend};
use super::errors::{StorageError, StorageResult};

type EntryKey = (EntityKind, String);

#[derive(Debug, Default)]
struct EngineState {
    index: Index,
    /// Unsaved entries and their last durable version (`None`: never saved)
    baseline: BTreeMap<EntryKey, Option<Entity>>,
}

impl EngineState {
    fn lookup(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.index.get(&kind).and_then(|by_id| by_id.get(id))
    }

    fn mark_unsaved(&mut self, kind: EntityKind, id: &str) {
        if !self.baseline.contains_key(&(kind, id.to_string())) {
            let durable = self.lookup(kind, id).cloned();
            self.baseline.insert((kind, id.to_string()), durable);
        }
    }

    fn insert(&mut self, entity: Entity) {
        self.mark_unsaved(entity.kind(), entity.id());
        self.index
            .entry(entity.kind())
            .or_default()
            .insert(entity.id().to_string(), entity);
    }

    fn modify<F>(&mut self, kind: EntityKind, id: &str, f: F) -> Option<Entity>
    where
        F: FnOnce(&mut Entity),
    {
        self.lookup(kind, id)?;
        self.mark_unsaved(kind, id);
        let entity = self.index.get_mut(&kind)?.get_mut(id)?;
        f(entity);
        entity.touch();
        Some(entity.clone())
    }

    fn remove(&mut self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.lookup(kind, id)?;
        self.mark_unsaved(kind, id);
        self.index.get_mut(&kind)?.remove(id)
    }

    /// Puts `key` back to `version` in the index.
    fn restore(&mut self, (kind, id): EntryKey, version: Option<Entity>) {
        match version {
            Some(entity) => {
                self.index.entry(kind).or_default().insert(id, entity);
            }
            None => {
                if let Some(by_id) = self.index.get_mut(&kind) {
                    by_id.remove(&id);
                }
            }
        }
    }

    /// What the backend must apply to catch up with the index.
    fn changes(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        for ((kind, id), durable) in &self.baseline {
            match self.lookup(*kind, id) {
                Some(entity) => changes.record_upsert(entity.clone()),
                None if durable.is_some() => changes.record_delete(*kind, id),
                // created and deleted again before any save
                None => {}
            }
        }
        changes
    }

    /// Returns every unsaved entry to its last durable version.
    fn roll_back(&mut self) -> usize {
        let baseline = std::mem::take(&mut self.baseline);
        let reverted = baseline.len();
        for (key, durable) in baseline {
            self.restore(key, durable);
        }
        reverted
    }
}

/// Mutations applied and saved as one unit by [`StorageEngine::write`].
///
/// Lookups see the batch's own earlier changes.
pub struct WriteBatch<'a> {
    state: &'a mut EngineState,
    /// First-touch index version and unsaved flag, for undoing the batch
    undo: BTreeMap<EntryKey, (Option<Entity>, bool)>,
}

impl<'a> WriteBatch<'a> {
    fn new(state: &'a mut EngineState) -> Self {
        Self {
            state,
            undo: BTreeMap::new(),
        }
    }

    fn remember(&mut self, kind: EntityKind, id: &str) {
        let key = (kind, id.to_string());
        if !self.undo.contains_key(&key) {
            let current = self.state.lookup(kind, id).cloned();
            let unsaved = self.state.baseline.contains_key(&key);
            self.undo.insert(key, (current, unsaved));
        }
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Entity> {
        self.state.lookup(kind, id)
    }

    pub fn contains(&self, kind: EntityKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    /// Same as [`StorageEngine::new`], inside the batch.
    pub fn insert(&mut self, entity: Entity) {
        self.remember(entity.kind(), entity.id());
        self.state.insert(entity);
    }

    /// Same as [`StorageEngine::update`], inside the batch.
    pub fn update<F>(&mut self, kind: EntityKind, id: &str, f: F) -> Option<Entity>
    where
        F: FnOnce(&mut Entity),
    {
        self.get(kind, id)?;
        self.remember(kind, id);
        self.state.modify(kind, id, f)
    }

    /// Same as [`StorageEngine::delete`], inside the batch.
    pub fn delete(&mut self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.get(kind, id)?;
        self.remember(kind, id);
        self.state.remove(kind, id)
    }

    /// Discards the batch's changes, leaving earlier unsaved ones alone.
    fn undo(self) {
        for (key, (version, unsaved)) in self.undo {
            if !unsaved {
                self.state.baseline.remove(&key);
            }
            self.state.restore(key, version);
        }
    }
}

pub struct StorageEngine {
    state: RwLock<EngineState>,
    backend: Mutex<Box<dyn StorageBackend>>,
    backend_name: &'static str,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("backend", &self.backend_name)
            .field("entities", &self.count_all())
            .finish()
    }
}

impl StorageEngine {
    /// Opens the engine over `backend`, loading every persisted entity.
    pub fn open(mut backend: Box<dyn StorageBackend>) -> StorageResult<Self> {
        let entities = backend.load()?;
        let backend_name = backend.name();
        let state = EngineState {
            index: build_index(entities),
            baseline: BTreeMap::new(),
        };

        let engine = Self {
            state: RwLock::new(state),
            backend: Mutex::new(backend),
            backend_name,
        };
        info!(
            backend = backend_name,
            entities = engine.count_all(),
            "storage opened"
        );
        Ok(engine)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    fn read(&self) -> RwLockReadGuard<'_, EngineState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, EngineState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> StorageResult<RwLockWriteGuard<'_, EngineState>> {
        self.state
            .write()
            .map_err(|_| StorageError::LockPoisoned("storage index"))
    }

    /// Identity lookup. `None` for unknown ids.
    pub fn get(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.read().lookup(kind, id).cloned()
    }

    /// Every live entity of `kind`, ordered by id.
    pub fn all(&self, kind: EntityKind) -> BTreeMap<String, Entity> {
        self.read().index.get(&kind).cloned().unwrap_or_default()
    }

    /// Every live entity of every kind.
    pub fn all_kinds(&self) -> Vec<Entity> {
        let state = self.read();
        Snapshot::new(&state.index).entities().cloned().collect()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.read().index.get(&kind).map_or(0, BTreeMap::len)
    }

    pub fn count_all(&self) -> usize {
        Snapshot::new(&self.read().index).len()
    }

    /// Live entity count per kind, keyed by collection name. Kinds with no
    /// entities are reported as zero.
    pub fn collection_counts(&self) -> BTreeMap<&'static str, usize> {
        let state = self.read();
        EntityKind::ALL
            .into_iter()
            .map(|kind| {
                let count = state.index.get(&kind).map_or(0, BTreeMap::len);
                (kind.collection(), count)
            })
            .collect()
    }

    /// Registers `entity` in the index. Not durable until [`save`](Self::save).
    ///
    /// An entity with the same kind and id is replaced.
    #[allow(clippy::new_ret_no_self)]
    pub fn new(&self, entity: Entity) {
        self.write_state().insert(entity);
    }

    /// Applies `f` to the stored entity and refreshes its `updated_at`.
    ///
    /// Returns the updated entity, or `None` if it does not exist.
    pub fn update<F>(&self, kind: EntityKind, id: &str, f: F) -> Option<Entity>
    where
        F: FnOnce(&mut Entity),
    {
        self.write_state().modify(kind, id, f)
    }

    /// Removes an entity. Subsequent lookups miss it immediately.
    pub fn delete(&self, kind: EntityKind, id: &str) -> Option<Entity> {
        self.write_state().remove(kind, id)
    }

    /// Runs `f` and saves under a single write lock.
    ///
    /// Checks made inside `f` hold until its changes are durable. If `f`
    /// fails its own changes are undone and nothing is saved; if the save
    /// fails every unsaved change is rolled back.
    pub fn write<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut WriteBatch<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut state = self.lock_state()?;
        let mut batch = WriteBatch::new(&mut *state);
        match f(&mut batch) {
            Ok(value) => {
                self.flush(&mut *state)?;
                Ok(value)
            }
            Err(e) => {
                batch.undo();
                Err(e)
            }
        }
    }

    /// Live entities of `child_kind` whose parent foreign key is `parent_id`.
    ///
    /// Derived on every call from the index, so unsaved changes show up.
    pub fn children_of(&self, child_kind: EntityKind, parent_id: &str) -> Vec<Entity> {
        let Some(parent) = child_kind.schema().parent else {
            return Vec::new();
        };
        let state = self.read();
        state
            .index
            .get(&child_kind)
            .map(|by_id| {
                by_id
                    .values()
                    .filter(|e| e.field_str(parent.field) == Some(parent_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_pending(&self) -> bool {
        !self.read().baseline.is_empty()
    }

    /// Makes every unsaved change durable.
    ///
    /// All or nothing. On failure the index goes back to what was last
    /// saved and the error is returned; nothing is retried.
    pub fn save(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        self.flush(&mut *state)
    }

    fn flush(&self, state: &mut EngineState) -> StorageResult<()> {
        if state.baseline.is_empty() {
            return Ok(());
        }

        let changes = state.changes();
        let result = self
            .backend
            .lock()
            .map_err(|_| StorageError::LockPoisoned("storage backend"))
            .and_then(|mut backend| backend.persist(&changes, Snapshot::new(&state.index)));

        match result {
            Ok(()) => {
                debug!(
                    backend = self.backend_name,
                    changes = changes.len(),
                    "saved pending changes"
                );
                state.baseline.clear();
                Ok(())
            }
            Err(e) => {
                let reverted = state.roll_back();
                error!(
                    backend = self.backend_name,
                    code = e.code(),
                    error = %e,
                    reverted,
                    "save failed, unsaved changes rolled back"
                );
                Err(e)
            }
        }
    }

    /// Drops the in-memory graph, unsaved changes included, and loads it
    /// again from the backend.
    pub fn reload(&self) -> StorageResult<()> {
        let mut state = self.lock_state()?;
        let mut backend = self
            .backend
            .lock()
            .map_err(|_| StorageError::LockPoisoned("storage backend"))?;

        let entities = backend.load()?;
        let discarded = state.baseline.len();
        state.index = build_index(entities);
        state.baseline.clear();

        info!(
            backend = self.backend_name,
            discarded_changes = discarded,
            "storage reloaded"
        );
        Ok(())
    }

    /// Saves anything pending and releases the backend.
    pub fn close(self) -> StorageResult<()> {
        self.save()?;
        info!(backend = self.backend_name, "storage closed");
        Ok(())
    }
}

fn build_index(entities: Vec<Entity>) -> Index {
    let mut index = Index::new();
    for entity in entities {
        index
            .entry(entity.kind())
            .or_default()
            .insert(entity.id().to_string(), entity);
    }
    index
}
