use std::path::PathBuf;

use marquee_types::RecordId;

/// Errors from record store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A record with this identifier already exists.
    #[error("record already exists: {0}")]
    Conflict(RecordId),

    /// The identifier belonged to a deleted record and cannot be reused.
    #[error("record identifier was retired: {0}")]
    Retired(RecordId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A stored document could not be decoded.
    #[error("corrupt record at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A lock guarding the store was poisoned by a panicking writer.
    #[error("store lock poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
