//! Commit record format for the record-log backend
//!
//! One `save()` produces exactly one commit record:
//!
//! ```text
//! +------------------+
//! | Record Length    | (u32 LE, whole record including this field)
//! +------------------+
//! | Sequence         | (u64 LE, strictly increasing)
//! +------------------+
//! | Body Length      | (u32 LE)
//! +------------------+
//! | Body             | (JSON array of change entries)
//! +------------------+
//! | Checksum         | (u32 LE)
//! +------------------+
//! ```
//!
//! The checksum covers every byte before it. A commit either verifies as a
//! whole or the log is corrupt; there are no partially applied commits.

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::checksum::{compute_checksum, verify_checksum};

/// len + sequence + body len + checksum
pub const MIN_RECORD_SIZE: usize = 4 + 8 + 4 + 4;

/// One change inside a commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ChangeEntry {
    /// Full stored form of an entity; replaces any earlier version
    Upsert { key: String, entity: Value },
    /// Tombstone for `key`
    Delete { key: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitRecord {
    pub sequence: u64,
    pub entries: Vec<ChangeEntry>,
}

impl CommitRecord {
    pub fn new(sequence: u64, entries: Vec<ChangeEntry>) -> Self {
        Self { sequence, entries }
    }

    pub fn serialize(&self) -> io::Result<Vec<u8>> {
        let body = serde_json::to_vec(&self.entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let record_length = u32::try_from(MIN_RECORD_SIZE + body.len()).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "Commit too large for one record")
        })?;
        let body_length = body.len() as u32;

        let mut record = Vec::with_capacity(record_length as usize);
        record.extend_from_slice(&record_length.to_le_bytes());
        record.extend_from_slice(&self.sequence.to_le_bytes());
        record.extend_from_slice(&body_length.to_le_bytes());
        record.extend_from_slice(&body);

        let checksum = compute_checksum(&record);
        record.extend_from_slice(&checksum.to_le_bytes());

        Ok(record)
    }

    /// Decodes the record at the start of `data`, verifying its checksum.
    ///
    /// Returns the record and the number of bytes consumed.
    pub fn deserialize(data: &[u8]) -> io::Result<(Self, usize)> {
        if data.len() < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("Record too short: {} bytes", data.len()),
            ));
        }

        let record_length = u32::from_le_bytes(read_array(data, 0)) as usize;
        if record_length < MIN_RECORD_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("Invalid record length: {}", record_length),
            ));
        }
        if data.len() < record_length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "Record truncated: expected {} bytes, got {}",
                    record_length,
                    data.len()
                ),
            ));
        }

        let checksum_offset = record_length - 4;
        let stored_checksum = u32::from_le_bytes(read_array(data, checksum_offset));
        if !verify_checksum(&data[..checksum_offset], stored_checksum) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Checksum mismatch: computed {:08x}, stored {:08x}",
                    compute_checksum(&data[..checksum_offset]),
                    stored_checksum
                ),
            ));
        }

        let sequence = u64::from_le_bytes(read_array(data, 4));
        let body_length = u32::from_le_bytes(read_array(data, 12)) as usize;
        if 16 + body_length != checksum_offset {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Body length {} disagrees with record length {}",
                    body_length, record_length
                ),
            ));
        }

        let entries: Vec<ChangeEntry> = serde_json::from_slice(&data[16..checksum_offset])
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        Ok((Self { sequence, entries }, record_length))
    }
}

fn read_array<const N: usize>(data: &[u8], offset: usize) -> [u8; N] {
    let mut buf = [0u8; N];
    buf.copy_from_slice(&data[offset..offset + N]);
    buf
}
