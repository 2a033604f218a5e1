//! Error types for the local store.
//!
//! Every fallible operation in the crate returns [`StoreError`]. Absence of a
//! record is not an error: point lookups return `Ok(None)` and deleting a
//! missing key succeeds.

use std::path::PathBuf;

use thiserror::Error;

use crate::collection::CollectionName;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The LMDB environment could not be opened. Fatal, never retried.
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: lmdb::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] lmdb::Error),

    /// Returned to callers that queued behind an open attempt which failed.
    /// Carries that attempt's error message.
    #[error("store open failed: {0}")]
    OpenFailed(String),

    #[error("migration from {from:?} to v{to} failed: {reason}")]
    Migration {
        from: Option<u32>,
        to: u32,
        reason: String,
    },

    /// The on-disk schema was written by a newer build.
    #[error("store schema v{found} is newer than supported v{supported}")]
    SchemaTooNew { found: u32, supported: u32 },

    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("record in '{collection}' has no string id")]
    MissingId { collection: CollectionName },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store data is corrupted: {0}")]
    Corrupted(String),

    #[error("timestamp formatting failed: {0}")]
    Timestamp(#[from] time::error::Format),

    #[error("entropy source unavailable: {0}")]
    Entropy(String),

    /// Returned from a transaction closure to roll the transaction back.
    #[error("transaction aborted: {0}")]
    Aborted(String),

    #[error("background task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for StoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        StoreError::Task(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
