//! The `Entity` record.
//!
//! An entity is an identity (`kind`, `id`), two timestamps, and a
//! schema-less field map. Clients see it as one flat JSON object.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use super::kind::{EntityKind, RESERVED_FIELDS};

/// Rendering format for `created_at` / `updated_at`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Failure to rebuild an entity from its stored form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityDecodeError {
    #[error("stored entity is not a JSON object")]
    NotAnObject,

    #[error("stored entity is missing `{0}`")]
    MissingField(&'static str),

    #[error("unknown class: {0}")]
    UnknownClass(String),

    #[error("invalid timestamp in `{field}`: {value}")]
    InvalidTimestamp { field: &'static str, value: String },
}

/// A typed, identity-bearing record.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    kind: EntityKind,
    id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    fields: Map<String, Value>,
}

/// Current time at the precision timestamps are stored with.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl Entity {
    /// Builds a fresh entity with a new id and `created_at == updated_at`.
    ///
    /// Engine-owned keys present in `fields` are dropped.
    pub fn new(kind: EntityKind, mut fields: Map<String, Value>) -> Self {
        for key in RESERVED_FIELDS {
            fields.remove(*key);
        }
        let timestamp = now();
        Self {
            kind,
            id: Uuid::new_v4().to_string(),
            created_at: timestamp,
            updated_at: timestamp,
            fields,
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Key under which the entity is persisted: `<Class>.<id>`.
    pub fn storage_key(&self) -> String {
        storage_key(self.kind, &self.id)
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Writes a type field. Reserved keys are ignored.
    pub fn set_field(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        if RESERVED_FIELDS.contains(&name.as_str()) {
            return;
        }
        self.fields.insert(name, value);
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = now();
    }

    /// Client-facing rendering; hidden fields are left out.
    pub fn to_json(&self) -> Value {
        let schema = self.kind.schema();
        let mut object = self.render();
        object.retain(|key, _| !schema.is_hidden(key));
        Value::Object(object)
    }

    /// Full rendering, hidden fields included. Used by storage backends.
    pub fn to_stored(&self) -> Value {
        Value::Object(self.render())
    }

    fn render(&self) -> Map<String, Value> {
        let mut object = self.fields.clone();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert(
            "created_at".to_string(),
            Value::String(self.created_at.format(TIMESTAMP_FORMAT).to_string()),
        );
        object.insert(
            "updated_at".to_string(),
            Value::String(self.updated_at.format(TIMESTAMP_FORMAT).to_string()),
        );
        object.insert(
            "__class__".to_string(),
            Value::String(self.kind.class_name().to_string()),
        );
        object
    }

    /// Rebuilds an entity from [`Entity::to_stored`] output.
    pub fn from_stored(value: Value) -> Result<Self, EntityDecodeError> {
        let Value::Object(mut object) = value else {
            return Err(EntityDecodeError::NotAnObject);
        };

        let class = take_string(&mut object, "__class__")?;
        let kind = EntityKind::from_class_name(&class)
            .ok_or(EntityDecodeError::UnknownClass(class))?;
        let id = take_string(&mut object, "id")?;
        let created_at = take_timestamp(&mut object, "created_at")?;
        let updated_at = take_timestamp(&mut object, "updated_at")?;

        Ok(Self {
            kind,
            id,
            created_at,
            updated_at,
            fields: object,
        })
    }
}

pub fn storage_key(kind: EntityKind, id: &str) -> String {
    format!("{}.{}", kind.class_name(), id)
}

fn take_string(
    object: &mut Map<String, Value>,
    field: &'static str,
) -> Result<String, EntityDecodeError> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        _ => Err(EntityDecodeError::MissingField(field)),
    }
}

fn take_timestamp(
    object: &mut Map<String, Value>,
    field: &'static str,
) -> Result<DateTime<Utc>, EntityDecodeError> {
    let raw = take_string(object, field)?;
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|_| EntityDecodeError::InvalidTimestamp { field, value: raw })
}
