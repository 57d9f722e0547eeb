//! Object graph model
//!
//! Five entity kinds (State, City, User, Place, Review), each described by a
//! static [`Schema`], all stored as [`Entity`] records.

mod entity;
mod kind;

pub use entity::{now, storage_key, Entity, EntityDecodeError, TIMESTAMP_FORMAT};
pub use kind::{EntityKind, Relation, Schema, RESERVED_FIELDS};
