//! Storage trait definitions

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Lock error: {0}")]
    Lock(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence backend for a [`DocumentDb`](crate::DocumentDb)
///
/// An adapter only moves whole document trees in and out of durable storage.
/// Interpreting the tree is the caller's business.
pub trait DocumentAdapter: Send {
    /// Read the persisted document
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    fn read(&self) -> StorageResult<Option<Value>>;

    /// Persist the full document, replacing whatever was stored before
    fn write(&self, state: &Value) -> StorageResult<()>;

    /// Short human-readable location used in log lines
    fn describe(&self) -> String;
}
