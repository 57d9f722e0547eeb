//! Storage error types
//!
//! Error codes:
//! - HBNB_STORAGE_IO_ERROR (ERROR severity)
//! - HBNB_STORAGE_WRITE_FAILED (ERROR severity)
//! - HBNB_STORAGE_READ_FAILED (ERROR severity)
//! - HBNB_STORAGE_LOCK_POISONED (ERROR severity)
//! - HBNB_DATA_CORRUPTION (FATAL severity)

use std::fmt;
use std::io;

use thiserror::Error;

use crate::model::EntityDecodeError;

/// Severity of a storage error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, server continues
    Error,
    /// Store cannot be trusted; the process must not keep serving it
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem failure outside of a read or write (directory setup, metadata)
    #[error("[ERROR] HBNB_STORAGE_IO_ERROR: {message}")]
    Io {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Persisting changes failed; nothing from this save is durable
    #[error("[ERROR] HBNB_STORAGE_WRITE_FAILED: {message}")]
    WriteFailed {
        message: String,
        #[source]
        source: Option<io::Error>,
    },

    /// Reading persisted state failed
    #[error("[ERROR] HBNB_STORAGE_READ_FAILED: {message}")]
    ReadFailed {
        message: String,
        #[source]
        source: io::Error,
    },

    /// An engine lock was poisoned by a panicking writer
    #[error("[ERROR] HBNB_STORAGE_LOCK_POISONED: {0}")]
    LockPoisoned(&'static str),

    /// Persisted bytes fail validation
    #[error("[FATAL] HBNB_DATA_CORRUPTION: {message}{}", detail_suffix(.details))]
    DataCorruption {
        message: String,
        details: Option<String>,
    },
}

impl StorageError {
    pub fn io_error(message: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source,
        }
    }

    pub fn write_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn write_failed_no_source(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
            source: None,
        }
    }

    pub fn read_failed(message: impl Into<String>, source: io::Error) -> Self {
        Self::ReadFailed {
            message: message.into(),
            source,
        }
    }

    pub fn data_corruption(message: impl Into<String>) -> Self {
        Self::DataCorruption {
            message: message.into(),
            details: None,
        }
    }

    /// Corruption with byte offset context
    pub fn corruption_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::DataCorruption {
            message: reason.into(),
            details: Some(format!("byte_offset: {}", offset)),
        }
    }

    /// Corruption attributed to one stored entity
    pub fn corrupt_entity(key: &str, err: EntityDecodeError) -> Self {
        Self::DataCorruption {
            message: err.to_string(),
            details: Some(format!("key: {}", key)),
        }
    }

    /// Stable error code string
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Io { .. } => "HBNB_STORAGE_IO_ERROR",
            StorageError::WriteFailed { .. } => "HBNB_STORAGE_WRITE_FAILED",
            StorageError::ReadFailed { .. } => "HBNB_STORAGE_READ_FAILED",
            StorageError::LockPoisoned(_) => "HBNB_STORAGE_LOCK_POISONED",
            StorageError::DataCorruption { .. } => "HBNB_DATA_CORRUPTION",
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            StorageError::DataCorruption { .. } => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

fn detail_suffix(details: &Option<String>) -> String {
    details
        .as_ref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
