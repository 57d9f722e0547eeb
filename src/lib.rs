//! hbnb - A resource-oriented JSON API over a pluggable entity store
//!
//! Layers, bottom up:
//! - [`model`]: entity kinds, their schemas, and the entity record
//! - [`storage`]: the storage engine and its backends
//! - [`resource`]: the per-request handler protocol
//! - [`http_server`]: axum routes under `/api/v1`
//! - [`cli`]: configuration and process entry points

pub mod cli;
pub mod http_server;
pub mod model;
pub mod observability;
pub mod resource;
pub mod storage;
