//! Session record manager
//!
//! [`Sessions`] owns TTL policy and record interpretation. Storage of the tree
//! belongs to the [`DocumentDb`](docsession_storage::DocumentDb); every
//! mutation here ends with a `write()` on it before returning.
//!
//! Reads never check expiry. Expired records stay visible to `get`, `all` and
//! `length` until [`Sessions::purge`] removes them.

use crate::clock::{Clock, SystemClock};
use crate::collection::SessionCollection;
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::record::SessionRecord;
use docsession_storage::{SharedDocument, lock_document};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// CRUD-with-expiry over one session collection
#[derive(Debug)]
pub struct Sessions {
    document: SharedDocument,
    collection: Box<dyn SessionCollection>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl Sessions {
    /// Create a manager from a store configuration, using the wall clock
    ///
    /// # Errors
    /// - `Error::Config` if the document does not fit the configured layout
    /// - `Error::Storage` if creating the collection slot cannot be persisted
    pub fn open(document: SharedDocument, config: &StoreConfig) -> Result<Self> {
        Self::open_with_clock(document, config, Arc::new(SystemClock))
    }

    /// Create a manager from a store configuration with an explicit clock
    pub fn open_with_clock(
        document: SharedDocument,
        config: &StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::new(document, config.collection(), config.effective_ttl(), clock)
    }

    /// Create a manager over any collection strategy
    ///
    /// The document is checked against the collection's expected shape here,
    /// so a mismatched document fails now rather than on first use.
    pub fn new(
        document: SharedDocument,
        collection: Box<dyn SessionCollection>,
        ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        {
            let mut db = lock_document(&document)?;
            if collection.prepare(db.state_mut())? {
                db.write()?;
            }
            tracing::debug!(
                "Session collection ready: {} in {} (ttl {}s)",
                collection.describe(),
                db.location(),
                ttl.as_secs()
            );
        }

        Ok(Self {
            document,
            collection,
            ttl,
            clock,
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Where the collection lives, for logs
    pub fn describe(&self) -> String {
        self.collection.describe()
    }

    /// Payload stored for `id`, expired or not
    pub fn get(&self, id: &str) -> Result<Option<Value>> {
        let db = lock_document(&self.document)?;
        Ok(self
            .collection
            .find(db.state(), id)
            .map(|record| record.payload))
    }

    /// Every payload in collection order
    pub fn all(&self) -> Result<Vec<Value>> {
        let db = lock_document(&self.document)?;
        Ok(self
            .collection
            .records(db.state())
            .into_iter()
            .map(|record| record.payload)
            .collect())
    }

    /// Every session id in collection order
    pub fn ids(&self) -> Result<Vec<String>> {
        let db = lock_document(&self.document)?;
        Ok(self
            .collection
            .records(db.state())
            .into_iter()
            .map(|record| record.id)
            .collect())
    }

    /// Full record for `id`, including its expiry
    pub fn record(&self, id: &str) -> Result<Option<SessionRecord>> {
        let db = lock_document(&self.document)?;
        Ok(self.collection.find(db.state(), id))
    }

    /// Number of stored records, including expired ones not yet purged
    pub fn length(&self) -> Result<usize> {
        let db = lock_document(&self.document)?;
        Ok(self.collection.len(db.state()))
    }

    /// Store `payload` under `id` and restart its TTL
    ///
    /// An existing record has its payload and expiry replaced, not merged.
    ///
    /// # Errors
    /// - `Error::Config` if `now + ttl` does not fit in epoch milliseconds
    pub fn set(&self, id: &str, payload: Value) -> Result<()> {
        let expires_at = self.expiry_from_now()?;
        let mut db = lock_document(&self.document)?;
        self.collection
            .upsert(db.state_mut(), SessionRecord::new(id, payload, expires_at))?;
        db.write()?;

        tracing::debug!("Stored session {} (expires at {})", id, expires_at);
        Ok(())
    }

    fn expiry_from_now(&self) -> Result<i64> {
        let now = self.clock.now_millis();
        i64::try_from(self.ttl.as_millis())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| {
                Error::Config(format!(
                    "ttl of {}s overflows the expiry timestamp",
                    self.ttl.as_secs()
                ))
            })
    }

    /// Remove the record for `id`; unknown ids are not an error
    pub fn destroy(&self, id: &str) -> Result<()> {
        let mut db = lock_document(&self.document)?;
        let removed = self.collection.remove(db.state_mut(), id)?;
        db.write()?;

        if removed {
            tracing::debug!("Destroyed session {}", id);
        }
        Ok(())
    }

    /// Remove every record of this collection
    pub fn clear(&self) -> Result<()> {
        let mut db = lock_document(&self.document)?;
        self.collection.clear(db.state_mut())?;
        db.write()?;

        tracing::debug!("Cleared sessions in {}", self.collection.describe());
        Ok(())
    }

    /// Remove records whose expiry is strictly before now
    ///
    /// Returns the number of records removed.
    pub fn purge(&self) -> Result<usize> {
        let now = self.clock.now_millis();
        let mut db = lock_document(&self.document)?;
        let removed = self
            .collection
            .retain(db.state_mut(), &mut |record: &SessionRecord| !record.is_expired_at(now))?;
        db.write()?;

        if removed > 0 {
            tracing::info!(
                "Purged {} expired sessions from {}",
                removed,
                self.collection.describe()
            );
        }
        Ok(removed)
    }
}
