//! Backing-store strategies for session collections
//!
//! A [`SessionCollection`] knows where a collection lives inside the document
//! tree and how records are laid out there. It never persists anything; the
//! [`Sessions`](crate::Sessions) manager flushes the document after every
//! mutation.
//!
//! Two layouts are supported:
//! - [`ArrayCollection`]: ordered array of `{ "_id", "session", "expires" }`
//! - [`MappingCollection`]: object of `{ "<sid>": { "session", "expires" } }`
//!
//! Both are optionally nested under a namespace key of the document root.

use crate::error::{Error, Result};
use crate::record::{ArrayEntry, MappedEntry, SessionRecord};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Capability contract a collection layout must satisfy
pub trait SessionCollection: Send + Sync + Debug {
    /// Check that the document has the expected shape and create the
    /// collection slot when it is missing
    ///
    /// Returns `true` when the document was changed and needs a write.
    ///
    /// # Errors
    /// - `Error::Config` when the slot or root holds an incompatible value
    fn prepare(&self, root: &mut Value) -> Result<bool>;

    /// Look up a record by id
    fn find(&self, root: &Value, id: &str) -> Option<SessionRecord>;

    /// All records in collection order
    fn records(&self, root: &Value) -> Vec<SessionRecord>;

    /// Number of records
    fn len(&self, root: &Value) -> usize {
        self.records(root).len()
    }

    /// Replace the record with the same id, or insert it
    fn upsert(&self, root: &mut Value, record: SessionRecord) -> Result<()>;

    /// Remove a record, returning whether it existed
    fn remove(&self, root: &mut Value, id: &str) -> Result<bool>;

    /// Keep only records for which `keep` returns true
    ///
    /// Returns the number of records removed.
    fn retain(
        &self,
        root: &mut Value,
        keep: &mut dyn FnMut(&SessionRecord) -> bool,
    ) -> Result<usize>;

    /// Remove every record
    fn clear(&self, root: &mut Value) -> Result<()> {
        self.retain(root, &mut |_: &SessionRecord| false).map(|_| ())
    }

    /// Location of the collection, for logs and errors
    fn describe(&self) -> String;
}

fn describe_slot(namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) => format!("'{}'", ns),
        None => "the document root".to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Ensure the root can hold a namespace key and that the key exists
///
/// `empty` builds the default slot value; `fits` checks an existing one.
fn prepare_slot(
    root: &mut Value,
    namespace: Option<&str>,
    expected: &str,
    empty: fn() -> Value,
    fits: fn(&Value) -> bool,
) -> Result<bool> {
    match namespace {
        Some(ns) => {
            let mut changed = false;
            if root.is_null() {
                *root = Value::Object(Map::new());
                changed = true;
            }
            let kind = json_kind(root);
            let Some(map) = root.as_object_mut() else {
                return Err(Error::Config(format!(
                    "The document root must be an object to hold namespace '{}', found {}",
                    ns, kind
                )));
            };
            match map.get(ns) {
                None => {
                    map.insert(ns.to_string(), empty());
                    changed = true;
                }
                Some(existing) if !fits(existing) => {
                    return Err(Error::Config(format!(
                        "The value at '{}' must be {}, found {}",
                        ns,
                        expected,
                        json_kind(existing)
                    )));
                }
                Some(_) => {}
            }
            Ok(changed)
        }
        None => {
            if root.is_null() {
                *root = empty();
                return Ok(true);
            }
            if !fits(root) {
                return Err(Error::Config(format!(
                    "The document root must be {}, found {}",
                    expected,
                    json_kind(root)
                )));
            }
            Ok(false)
        }
    }
}

fn slot<'a>(root: &'a Value, namespace: Option<&str>) -> Option<&'a Value> {
    match namespace {
        Some(ns) => root.get(ns),
        None => Some(root),
    }
}

/// Array-backed collection
#[derive(Debug, Clone)]
pub struct ArrayCollection {
    namespace: Option<String>,
}

impl ArrayCollection {
    /// Collection stored as an array under `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// Collection stored as the document root itself
    pub fn at_root() -> Self {
        Self { namespace: None }
    }

    fn items<'a>(&self, root: &'a Value) -> &'a [Value] {
        slot(root, self.namespace.as_deref())
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn items_mut<'a>(&self, root: &'a mut Value) -> Result<&'a mut Vec<Value>> {
        prepare_slot(
            root,
            self.namespace.as_deref(),
            "an array",
            || Value::Array(Vec::new()),
            Value::is_array,
        )?;
        let slot = match self.namespace.as_deref() {
            Some(ns) => root.get_mut(ns),
            None => Some(root),
        };
        slot.and_then(Value::as_array_mut).ok_or_else(|| {
            Error::Config(format!(
                "The value at {} must be an array",
                describe_slot(self.namespace.as_deref())
            ))
        })
    }
}

fn entry_id(value: &Value) -> Option<&str> {
    value.get("_id").and_then(Value::as_str)
}

impl SessionCollection for ArrayCollection {
    fn prepare(&self, root: &mut Value) -> Result<bool> {
        prepare_slot(
            root,
            self.namespace.as_deref(),
            "an array",
            || Value::Array(Vec::new()),
            Value::is_array,
        )
    }

    fn find(&self, root: &Value, id: &str) -> Option<SessionRecord> {
        self.items(root)
            .iter()
            .find(|item| entry_id(item) == Some(id))
            .and_then(ArrayEntry::decode)
    }

    fn records(&self, root: &Value) -> Vec<SessionRecord> {
        self.items(root)
            .iter()
            .filter_map(|item| {
                let record = ArrayEntry::decode(item);
                if record.is_none() {
                    tracing::warn!(
                        "Skipping malformed session entry in {}",
                        self.describe()
                    );
                }
                record
            })
            .collect()
    }

    fn len(&self, root: &Value) -> usize {
        self.items(root)
            .iter()
            .filter(|item| ArrayEntry::decode(item).is_some())
            .count()
    }

    fn upsert(&self, root: &mut Value, record: SessionRecord) -> Result<()> {
        let items = self.items_mut(root)?;
        let position = items
            .iter()
            .position(|item| entry_id(item) == Some(record.id.as_str()));
        let encoded = ArrayEntry::encode(record)?;

        match position {
            // Assign over the existing entry so unrelated fields survive
            Some(index) => match (&mut items[index], encoded) {
                (Value::Object(existing), Value::Object(fields)) => existing.extend(fields),
                (existing, encoded) => *existing = encoded,
            },
            None => items.push(encoded),
        }
        Ok(())
    }

    fn remove(&self, root: &mut Value, id: &str) -> Result<bool> {
        let items = self.items_mut(root)?;
        let before = items.len();
        items.retain(|item| entry_id(item) != Some(id));
        Ok(items.len() != before)
    }

    fn retain(
        &self,
        root: &mut Value,
        keep: &mut dyn FnMut(&SessionRecord) -> bool,
    ) -> Result<usize> {
        let items = self.items_mut(root)?;
        let before = items.len();
        // Entries that do not decode are left alone
        items.retain(|item| ArrayEntry::decode(item).is_none_or(|record| keep(&record)));
        Ok(before - items.len())
    }

    fn clear(&self, root: &mut Value) -> Result<()> {
        self.items_mut(root)?.clear();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("array at {}", describe_slot(self.namespace.as_deref()))
    }
}

/// Mapping-backed collection, keyed by session id
///
/// At the document root only record-shaped entries are treated as sessions,
/// so namespaced collections stored next to them are never touched. Setting a
/// session whose id collides with such an entry fails with
/// `Error::InvalidRecord`.
#[derive(Debug, Clone)]
pub struct MappingCollection {
    namespace: Option<String>,
}

impl MappingCollection {
    /// Collection stored as an object under `namespace`
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
        }
    }

    /// Collection stored directly in the document root object
    pub fn at_root() -> Self {
        Self { namespace: None }
    }

    fn entries<'a>(&self, root: &'a Value) -> Option<&'a Map<String, Value>> {
        slot(root, self.namespace.as_deref()).and_then(Value::as_object)
    }

    fn entries_mut<'a>(&self, root: &'a mut Value) -> Result<&'a mut Map<String, Value>> {
        prepare_slot(
            root,
            self.namespace.as_deref(),
            "an object",
            || Value::Object(Map::new()),
            Value::is_object,
        )?;
        let slot = match self.namespace.as_deref() {
            Some(ns) => root.get_mut(ns),
            None => Some(root),
        };
        slot.and_then(Value::as_object_mut).ok_or_else(|| {
            Error::Config(format!(
                "The value at {} must be an object",
                describe_slot(self.namespace.as_deref())
            ))
        })
    }
}

impl SessionCollection for MappingCollection {
    fn prepare(&self, root: &mut Value) -> Result<bool> {
        prepare_slot(
            root,
            self.namespace.as_deref(),
            "an object",
            || Value::Object(Map::new()),
            Value::is_object,
        )
    }

    fn find(&self, root: &Value, id: &str) -> Option<SessionRecord> {
        self.entries(root)?
            .get(id)
            .and_then(|value| MappedEntry::decode(id, value))
    }

    fn records(&self, root: &Value) -> Vec<SessionRecord> {
        self.entries(root)
            .map(|map| {
                map.iter()
                    .filter_map(|(id, value)| MappedEntry::decode(id, value))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn upsert(&self, root: &mut Value, record: SessionRecord) -> Result<()> {
        let entries = self.entries_mut(root)?;
        // Never overwrite a key that holds something other than a session
        if let Some(existing) = entries.get(&record.id)
            && MappedEntry::decode(&record.id, existing).is_none()
        {
            return Err(Error::InvalidRecord(format!(
                "'{}' in {} holds {} that is not a session",
                record.id,
                self.describe(),
                json_kind(existing)
            )));
        }
        let id = record.id.clone();
        entries.insert(id, MappedEntry::encode(record)?);
        Ok(())
    }

    fn remove(&self, root: &mut Value, id: &str) -> Result<bool> {
        let entries = self.entries_mut(root)?;
        let is_record = entries
            .get(id)
            .is_some_and(|value| MappedEntry::decode(id, value).is_some());
        if is_record {
            entries.remove(id);
        }
        Ok(is_record)
    }

    fn retain(
        &self,
        root: &mut Value,
        keep: &mut dyn FnMut(&SessionRecord) -> bool,
    ) -> Result<usize> {
        let entries = self.entries_mut(root)?;
        let before = entries.len();
        entries.retain(|id, value| MappedEntry::decode(id, value).is_none_or(|record| keep(&record)));
        Ok(before - entries.len())
    }

    fn describe(&self) -> String {
        format!("mapping at {}", describe_slot(self.namespace.as_deref()))
    }
}
