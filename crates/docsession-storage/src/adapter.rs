//! Document adapters: JSON file and in-memory

use crate::atomic_writer::write_atomic;
use crate::traits::{DocumentAdapter, StorageError, StorageResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Persists the document as a JSON file
#[derive(Debug, Clone)]
pub struct JsonFileAdapter {
    path: PathBuf,
    pretty: bool,
}

impl JsonFileAdapter {
    /// Create an adapter for the given file (it does not need to exist yet)
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pretty: true,
        }
    }

    /// Write compact JSON instead of pretty-printed JSON
    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentAdapter for JsonFileAdapter {
    fn read(&self) -> StorageResult<Option<Value>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content).map(Some).map_err(|e| {
            StorageError::Serialization(format!(
                "Failed to parse {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write(&self, state: &Value) -> StorageResult<()> {
        let content = if self.pretty {
            serde_json::to_vec_pretty(state)
        } else {
            serde_json::to_vec(state)
        }
        .map_err(|e| StorageError::Serialization(format!("Failed to serialize document: {}", e)))?;

        write_atomic(&self.path, &content)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Keeps the last written snapshot in memory
///
/// Clones share the snapshot, so a test can hold one clone while the
/// database owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    initial: Option<Value>,
    snapshot: Arc<Mutex<Option<Value>>>,
    writes: Arc<AtomicUsize>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document, as if it had been read from disk
    pub fn with_initial(initial: Value) -> Self {
        Self {
            initial: Some(initial),
            ..Self::default()
        }
    }

    /// Last written document, if any
    pub fn snapshot(&self) -> Option<Value> {
        self.snapshot.lock().ok().and_then(|guard| guard.clone())
    }

    /// Number of completed writes
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl DocumentAdapter for MemoryAdapter {
    fn read(&self) -> StorageResult<Option<Value>> {
        let snapshot = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire snapshot lock: {}", e)))?;
        Ok(snapshot.clone().or_else(|| self.initial.clone()))
    }

    fn write(&self, state: &Value) -> StorageResult<()> {
        let mut snapshot = self
            .snapshot
            .lock()
            .map_err(|e| StorageError::Lock(format!("Failed to acquire snapshot lock: {}", e)))?;
        *snapshot = Some(state.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_file_read_missing_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = JsonFileAdapter::new(temp_dir.path().join("missing.json"));

        assert!(adapter.read().unwrap().is_none());
    }

    #[test]
    fn test_file_read_empty_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("empty.json");
        std::fs::write(&path, "  \n").unwrap();

        assert!(JsonFileAdapter::new(&path).read().unwrap().is_none());
    }

    #[test]
    fn test_file_write_then_read() {
        let temp_dir = TempDir::new().unwrap();
        let adapter = JsonFileAdapter::new(temp_dir.path().join("db.json"));
        let doc = json!({"sessions": {"a": {"session": {"n": 1}, "expires": 5}}});

        adapter.write(&doc).unwrap();

        assert_eq!(adapter.read().unwrap(), Some(doc));
    }

    #[test]
    fn test_file_compact_output() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("db.json");
        let adapter = JsonFileAdapter::new(&path).compact();

        adapter.write(&json!({"a": [1, 2]})).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"a":[1,2]}"#);
    }

    #[test]
    fn test_file_read_invalid_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = JsonFileAdapter::new(&path).read().unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_memory_snapshot_shared_between_clones() {
        let adapter = MemoryAdapter::with_initial(json!([]));
        let observer = adapter.clone();

        assert_eq!(adapter.read().unwrap(), Some(json!([])));
        adapter.write(&json!([1])).unwrap();

        assert_eq!(observer.snapshot(), Some(json!([1])));
        assert_eq!(observer.write_count(), 1);
        assert_eq!(adapter.read().unwrap(), Some(json!([1])));
    }
}
