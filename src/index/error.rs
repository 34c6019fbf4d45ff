//! Error types for the registry index

use std::path::PathBuf;

/// Errors surfaced by the query API
///
/// `Unavailable` and `Updating` mean "not ready"; they are never used to
/// signal that a crate is absent.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("crates index is unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("crates index is being updated")]
    Updating,

    #[error("crates index storage error: {0}")]
    Storage(#[from] StoreError),
}

impl IndexError {
    /// Whether retrying the query later may succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(self, IndexError::Updating)
    }
}

/// Errors produced by the persistent store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("store at {path} is locked by another process")]
    Locked { path: PathBuf },

    #[error("store record for `{name}` is corrupted: {reason}")]
    Corrupted { name: String, reason: String },

    #[error("record of {len} bytes exceeds the store limit")]
    RecordTooLarge { len: usize },
}

/// Errors produced while parsing a single registry record
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("malformed registry record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record names `{found}` but belongs to `{expected}`")]
    NameMismatch { expected: String, found: String },
}
