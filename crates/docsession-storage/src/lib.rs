//! docsession Storage
//!
//! This crate provides the embedded document database the session layer
//! persists into:
//! - An in-memory JSON document tree with an explicit `write()` step
//! - A JSON file adapter with atomic replacement on write
//! - An in-memory adapter for tests and ephemeral deployments

pub mod adapter;
mod atomic_writer;
pub mod document;
pub mod traits;

pub use adapter::{JsonFileAdapter, MemoryAdapter};
pub use document::{DocumentDb, SharedDocument, lock_document};
pub use traits::{DocumentAdapter, StorageError, StorageResult};
