//! Entity kinds and their declared field maps.
//!
//! Every kind has exactly one [`Schema`]: which fields a create must carry,
//! which ids the payload must point at, which fields an update may never
//! touch, and which parent the kind hangs off. The table is a `match` over
//! [`EntityKind`], so a kind without a schema does not compile.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Keys owned by the engine. Never taken from a client payload.
pub const RESERVED_FIELDS: &[&str] = &["id", "created_at", "updated_at", "__class__"];

/// The five entity kinds of the object graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    State,
    City,
    User,
    Place,
    Review,
}

/// A foreign-key edge: `field` on this kind holds the id of a `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    pub field: &'static str,
    pub target: EntityKind,
}

/// Declared field map for one entity kind.
#[derive(Debug)]
pub struct Schema {
    pub kind: EntityKind,
    /// Class name as rendered in `__class__` and in storage keys
    pub class_name: &'static str,
    /// Route segment, e.g. `states`
    pub collection: &'static str,
    /// Owning parent; the fk value always comes from the request path
    pub parent: Option<Relation>,
    /// Fields a create must carry, checked in this order
    pub required: &'static [&'static str],
    /// Payload fields that must name an existing entity
    pub references: &'static [Relation],
    /// Fields an update silently ignores
    pub immutable: &'static [&'static str],
    /// Fields stored but never rendered to clients
    pub hidden: &'static [&'static str],
}

static STATE: Schema = Schema {
    kind: EntityKind::State,
    class_name: "State",
    collection: "states",
    parent: None,
    required: &["name"],
    references: &[],
    immutable: &["id", "created_at", "updated_at"],
    hidden: &[],
};

static CITY: Schema = Schema {
    kind: EntityKind::City,
    class_name: "City",
    collection: "cities",
    parent: Some(Relation {
        field: "state_id",
        target: EntityKind::State,
    }),
    required: &["name"],
    references: &[],
    immutable: &["id", "state_id", "created_at", "updated_at"],
    hidden: &[],
};

static USER: Schema = Schema {
    kind: EntityKind::User,
    class_name: "User",
    collection: "users",
    parent: None,
    required: &["email", "password"],
    references: &[],
    immutable: &["id", "email", "created_at", "updated_at"],
    hidden: &["password"],
};

static PLACE: Schema = Schema {
    kind: EntityKind::Place,
    class_name: "Place",
    collection: "places",
    parent: Some(Relation {
        field: "city_id",
        target: EntityKind::City,
    }),
    required: &["user_id", "name"],
    references: &[Relation {
        field: "user_id",
        target: EntityKind::User,
    }],
    immutable: &["id", "user_id", "city_id", "created_at", "updated_at"],
    hidden: &[],
};

static REVIEW: Schema = Schema {
    kind: EntityKind::Review,
    class_name: "Review",
    collection: "reviews",
    parent: Some(Relation {
        field: "place_id",
        target: EntityKind::Place,
    }),
    required: &["user_id", "text"],
    references: &[Relation {
        field: "user_id",
        target: EntityKind::User,
    }],
    immutable: &["id", "user_id", "place_id", "created_at", "updated_at"],
    hidden: &[],
};

impl EntityKind {
    /// All kinds, parents before children.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::State,
        EntityKind::City,
        EntityKind::User,
        EntityKind::Place,
        EntityKind::Review,
    ];

    pub fn schema(self) -> &'static Schema {
        match self {
            EntityKind::State => &STATE,
            EntityKind::City => &CITY,
            EntityKind::User => &USER,
            EntityKind::Place => &PLACE,
            EntityKind::Review => &REVIEW,
        }
    }

    pub fn class_name(self) -> &'static str {
        self.schema().class_name
    }

    pub fn collection(self) -> &'static str {
        self.schema().collection
    }

    /// Looks a kind up by its class name (`"Place"`).
    pub fn from_class_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.class_name() == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl Schema {
    /// Whether an update payload may write `key`.
    pub fn is_settable(&self, key: &str) -> bool {
        key != "__class__" && !self.immutable.contains(&key)
    }

    /// Whether a create payload may carry `key` verbatim.
    ///
    /// Engine-owned keys and the path-injected parent fk are dropped.
    pub fn accepts_on_create(&self, key: &str) -> bool {
        if RESERVED_FIELDS.contains(&key) {
            return false;
        }
        match self.parent {
            Some(parent) => parent.field != key,
            None => true,
        }
    }

    pub fn is_hidden(&self, key: &str) -> bool {
        self.hidden.contains(&key)
    }
}
