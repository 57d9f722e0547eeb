//! Storage subsystem
//!
//! The [`StorageEngine`] owns every entity: identity lookup, per-kind
//! enumeration, mutation, derived parent → children navigation, and
//! durability through a pluggable [`StorageBackend`].
//!
//! Backends:
//! - [`JsonFileBackend`]: whole graph in one JSON file, replaced atomically
//! - [`RecordLogBackend`]: append-only log of checksummed commit records
//! - [`MemoryBackend`]: nothing leaves the process

mod backend;
mod checksum;
mod config;
mod engine;
mod errors;
mod json_file;
mod memory;
mod record;
mod record_log;

pub use backend::{Change, ChangeSet, Snapshot, StorageBackend};
pub use checksum::{compute_checksum, verify_checksum};
pub use config::{BackendKind, StorageConfig};
pub use engine::{StorageEngine, WriteBatch};
pub use errors::{Severity, StorageError, StorageResult};
pub use json_file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use record::{ChangeEntry, CommitRecord};
pub use record_log::RecordLogBackend;
