//! In-memory document tree with explicit persistence

use crate::traits::{DocumentAdapter, StorageError, StorageResult};
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex, MutexGuard};

/// Document database shared between session collections
pub type SharedDocument = Arc<Mutex<DocumentDb>>;

/// A JSON document held in memory and flushed through a [`DocumentAdapter`]
///
/// Mutations through [`state_mut`](Self::state_mut) only touch memory; nothing
/// reaches the adapter until [`write`](Self::write) is called.
pub struct DocumentDb {
    state: Value,
    adapter: Box<dyn DocumentAdapter>,
}

impl DocumentDb {
    /// Open a database, loading whatever the adapter has persisted
    ///
    /// A fresh database starts as an empty object.
    pub fn open(adapter: impl DocumentAdapter + 'static) -> StorageResult<Self> {
        Self::open_with_default(adapter, Value::Object(Map::new()))
    }

    /// Open a database, starting from `default` when nothing is persisted
    pub fn open_with_default(
        adapter: impl DocumentAdapter + 'static,
        default: Value,
    ) -> StorageResult<Self> {
        let state = adapter.read()?.unwrap_or(default);

        tracing::debug!("Opened document database at {}", adapter.describe());

        Ok(Self {
            state,
            adapter: Box::new(adapter),
        })
    }

    /// Wrap the database for sharing between collections
    pub fn into_shared(self) -> SharedDocument {
        Arc::new(Mutex::new(self))
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut Value {
        &mut self.state
    }

    /// Replace the whole document
    pub fn set_state(&mut self, state: Value) {
        self.state = state;
    }

    /// Persist the current document
    pub fn write(&self) -> StorageResult<()> {
        self.adapter.write(&self.state)
    }

    /// Discard in-memory changes and load the persisted document again
    pub fn reload(&mut self) -> StorageResult<()> {
        if let Some(state) = self.adapter.read()? {
            self.state = state;
        }
        Ok(())
    }

    /// Where the document is persisted
    pub fn location(&self) -> String {
        self.adapter.describe()
    }
}

impl std::fmt::Debug for DocumentDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentDb")
            .field("location", &self.adapter.describe())
            .finish_non_exhaustive()
    }
}

/// Lock a shared document
pub fn lock_document(document: &SharedDocument) -> StorageResult<MutexGuard<'_, DocumentDb>> {
    document
        .lock()
        .map_err(|e| StorageError::Lock(format!("Failed to acquire document lock: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{JsonFileAdapter, MemoryAdapter};
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_fresh_database_is_empty_object() {
        let db = DocumentDb::open(MemoryAdapter::new()).unwrap();
        assert_eq!(db.state(), &json!({}));
    }

    #[test]
    fn test_default_only_used_when_nothing_persisted() {
        let db = DocumentDb::open_with_default(MemoryAdapter::new(), json!([])).unwrap();
        assert_eq!(db.state(), &json!([]));

        let db =
            DocumentDb::open_with_default(MemoryAdapter::with_initial(json!({"a": 1})), json!([]))
                .unwrap();
        assert_eq!(db.state(), &json!({"a": 1}));
    }

    #[test]
    fn test_mutation_not_persisted_until_write() {
        let adapter = MemoryAdapter::new();
        let observer = adapter.clone();
        let mut db = DocumentDb::open(adapter).unwrap();

        db.state_mut()["key"] = json!("value");
        assert!(observer.snapshot().is_none());

        db.write().unwrap();
        assert_eq!(observer.snapshot(), Some(json!({"key": "value"})));
    }

    #[test]
    fn test_reload_discards_unwritten_changes() {
        let mut db = DocumentDb::open(MemoryAdapter::with_initial(json!({"n": 1}))).unwrap();

        db.set_state(json!({"n": 2}));
        db.reload().unwrap();

        assert_eq!(db.state(), &json!({"n": 1}));
    }

    #[test]
    fn test_persist_and_reopen_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");

        {
            let mut db = DocumentDb::open(JsonFileAdapter::new(&path)).unwrap();
            db.state_mut()["sessions"] = json!({"s1": {"session": {}, "expires": 1}});
            db.write().unwrap();
        }

        let db = DocumentDb::open(JsonFileAdapter::new(&path)).unwrap();
        assert_eq!(db.state()["sessions"]["s1"]["expires"], json!(1));
        assert_eq!(db.location(), path.display().to_string());
    }

    #[test]
    fn test_lock_shared_document() {
        let shared = DocumentDb::open(MemoryAdapter::new()).unwrap().into_shared();

        lock_document(&shared).unwrap().state_mut()["x"] = json!(true);

        assert_eq!(lock_document(&shared).unwrap().state(), &json!({"x": true}));
    }
}
