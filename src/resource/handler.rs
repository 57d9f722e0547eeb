//! # Resource Handler
//!
//! One handler per entity kind, all running the same sequence:
//!
//! 1. resolve path ids (parent first, then target)
//! 2. decode the body as a JSON object
//! 3. required fields, in declared order (create)
//! 4. referenced entities exist (create)
//! 5. drop immutable fields (update)
//! 6. mutate through the engine
//! 7. save once
//! 8. hand back the result
//!
//! Mutating requests run steps 1 to 7 inside one engine write batch, so a
//! parent or reference checked in step 1 or 4 cannot vanish before the
//! save. A rejected request leaves the store as it was.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::model::{Entity, EntityKind, Schema};
use crate::storage::{StorageEngine, WriteBatch};

use super::errors::{ResourceError, ResourceResult};
use super::payload::RequestBody;

#[derive(Debug, Clone)]
pub struct ResourceHandler {
    engine: Arc<StorageEngine>,
    schema: &'static Schema,
}

impl ResourceHandler {
    pub fn new(engine: Arc<StorageEngine>, kind: EntityKind) -> Self {
        Self {
            engine,
            schema: kind.schema(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.schema.kind
    }

    pub fn schema(&self) -> &'static Schema {
        self.schema
    }

    /// Checks the owning parent named in the request path.
    fn resolve_parent<F>(&self, parent_id: Option<&str>, exists: F) -> ResourceResult<()>
    where
        F: Fn(EntityKind, &str) -> bool,
    {
        match (self.schema.parent, parent_id) {
            (None, None) => Ok(()),
            (Some(relation), Some(id)) if exists(relation.target, id) => Ok(()),
            // A parent segment on a root kind, or a child kind addressed
            // without its parent, names nothing.
            _ => Err(ResourceError::NotFound),
        }
    }

    fn resolve_target(&self, batch: &WriteBatch<'_>, id: &str) -> ResourceResult<()> {
        if batch.contains(self.schema.kind, id) {
            Ok(())
        } else {
            Err(ResourceError::NotFound)
        }
    }

    /// Lists a parent's children, or every instance of a root kind.
    pub fn list(&self, parent_id: Option<&str>) -> ResourceResult<Vec<Entity>> {
        self.resolve_parent(parent_id, |kind, id| self.engine.get(kind, id).is_some())?;
        match parent_id {
            Some(parent_id) => Ok(self.engine.children_of(self.schema.kind, parent_id)),
            None => Ok(self.engine.all(self.schema.kind).into_values().collect()),
        }
    }

    pub fn get(&self, id: &str) -> ResourceResult<Entity> {
        self.engine
            .get(self.schema.kind, id)
            .ok_or(ResourceError::NotFound)
    }

    pub fn create(&self, parent_id: Option<&str>, body: &RequestBody) -> ResourceResult<Entity> {
        let schema = self.schema;
        let entity = self.engine.write(|batch| -> ResourceResult<Entity> {
            self.resolve_parent(parent_id, |kind, id| batch.contains(kind, id))?;
            let payload = body.decode()?;

            for &field in schema.required {
                if !payload.contains_key(field) {
                    return Err(ResourceError::MissingField(field));
                }
            }

            for reference in schema.references {
                let id = payload
                    .get(reference.field)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if !batch.contains(reference.target, id) {
                    debug!(
                        kind = %schema.kind,
                        field = reference.field,
                        id,
                        "create references a missing entity"
                    );
                    return Err(ResourceError::ReferenceNotFound {
                        kind: reference.target,
                        id: id.to_string(),
                    });
                }
            }

            let mut fields: Map<String, Value> = payload
                .into_iter()
                .filter(|(key, _)| schema.accepts_on_create(key))
                .collect();
            if let (Some(relation), Some(parent_id)) = (schema.parent, parent_id) {
                fields.insert(
                    relation.field.to_string(),
                    Value::String(parent_id.to_string()),
                );
            }

            let entity = Entity::new(schema.kind, fields);
            batch.insert(entity.clone());
            Ok(entity)
        })?;

        info!(kind = %schema.kind, id = entity.id(), "created");
        Ok(entity)
    }

    /// Applies every settable field of the payload; immutable ones are
    /// ignored without error.
    pub fn update(&self, id: &str, body: &RequestBody) -> ResourceResult<Entity> {
        let schema = self.schema;
        let updated = self.engine.write(|batch| -> ResourceResult<Entity> {
            self.resolve_target(batch, id)?;
            let payload = body.decode()?;

            batch
                .update(schema.kind, id, |entity| {
                    for (key, value) in payload {
                        if schema.is_settable(&key) {
                            entity.set_field(key, value);
                        }
                    }
                })
                .ok_or(ResourceError::NotFound)
        })?;

        info!(kind = %schema.kind, id, "updated");
        Ok(updated)
    }

    /// Removes the entity. Children are left in place.
    pub fn delete(&self, id: &str) -> ResourceResult<()> {
        let kind = self.schema.kind;
        self.engine.write(|batch| -> ResourceResult<()> {
            self.resolve_target(batch, id)?;
            batch.delete(kind, id).ok_or(ResourceError::NotFound)?;
            Ok(())
        })?;

        info!(kind = %kind, id, "deleted");
        Ok(())
    }
}
