//! Session store contract and its document-backed implementation

use crate::purge::{PurgeTask, spawn_purge_task};
use async_trait::async_trait;
use docsession_core::{Clock, Error, Result, Sessions, StoreConfig, SystemClock};
use docsession_storage::SharedDocument;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// Session store contract used by HTTP session middleware
///
/// Each call resolves exactly once: `Ok` carries the result (or `()` for
/// operations without one), `Err` carries the failure. Looking up or
/// destroying an unknown session is not a failure.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Payloads of every stored session
    async fn all(&self) -> Result<Vec<Value>>;

    /// Remove every session
    async fn clear(&self) -> Result<()>;

    /// Remove one session
    async fn destroy(&self, sid: &str) -> Result<()>;

    /// Payload of one session, `None` if unknown
    async fn get(&self, sid: &str) -> Result<Option<Value>>;

    /// Number of stored sessions
    async fn length(&self) -> Result<usize>;

    /// Create or replace a session and restart its TTL
    async fn set(&self, sid: &str, session: Value) -> Result<()>;

    /// Restart a session's TTL
    ///
    /// Same as [`set`](Self::set): the given payload replaces the stored one.
    async fn touch(&self, sid: &str, session: Value) -> Result<()> {
        self.set(sid, session).await
    }
}

/// [`SessionStore`] over a JSON document database
///
/// Construction starts the purge task unless `disable_purge` is set. Call
/// [`close`](Self::close) to stop it; dropping the store aborts it.
pub struct DocSessionStore {
    sessions: Arc<Sessions>,
    purge_task: Mutex<Option<PurgeTask>>,
}

impl DocSessionStore {
    /// Create a store using the wall clock
    ///
    /// # Errors
    /// - `Error::Config` for an invalid configuration, a document that does not
    ///   fit the configured layout, or purging enabled outside a tokio runtime
    /// - `Error::Storage` if preparing the document cannot be persisted
    pub fn new(document: SharedDocument, config: StoreConfig) -> Result<Self> {
        Self::with_clock(document, config, Arc::new(SystemClock))
    }

    /// Create a store with an explicit clock
    pub fn with_clock(
        document: SharedDocument,
        config: StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let sessions = Sessions::open_with_clock(document, &config, clock)?;
        Self::from_sessions(sessions, &config)
    }

    /// Wrap an existing manager; only the purge settings of `config` are used
    pub fn from_sessions(sessions: Sessions, config: &StoreConfig) -> Result<Self> {
        let sessions = Arc::new(sessions);

        let purge_task = if config.disable_purge {
            tracing::debug!("Purge task disabled for {}", sessions.describe());
            None
        } else {
            if tokio::runtime::Handle::try_current().is_err() {
                return Err(Error::Config(
                    "The purge task requires a tokio runtime; set disable_purge to run without one"
                        .to_string(),
                ));
            }
            Some(spawn_purge_task(sessions.clone(), config.purge_interval()))
        };

        Ok(Self {
            sessions,
            purge_task: Mutex::new(purge_task),
        })
    }

    /// The underlying record manager
    pub fn sessions(&self) -> &Sessions {
        &self.sessions
    }

    /// Purge expired sessions now, returning how many were removed
    pub async fn purge(&self) -> Result<usize> {
        self.sessions.purge()
    }

    /// Whether the background purge task is running
    pub fn is_purging(&self) -> bool {
        self.purge_task
            .lock()
            .map(|guard| guard.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// Stop the background purge task
    ///
    /// Safe to call more than once. Store operations keep working afterwards.
    pub async fn close(&self) {
        let task = self.purge_task.lock().ok().and_then(|mut guard| guard.take());
        if let Some(task) = task {
            task.shutdown().await;
        }
    }
}

impl std::fmt::Debug for DocSessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocSessionStore")
            .field("sessions", &self.sessions)
            .field("purging", &self.is_purging())
            .finish()
    }
}

#[async_trait]
impl SessionStore for DocSessionStore {
    async fn all(&self) -> Result<Vec<Value>> {
        self.sessions.all()
    }

    async fn clear(&self) -> Result<()> {
        self.sessions.clear()
    }

    async fn destroy(&self, sid: &str) -> Result<()> {
        self.sessions.destroy(sid)
    }

    async fn get(&self, sid: &str) -> Result<Option<Value>> {
        self.sessions.get(sid)
    }

    async fn length(&self) -> Result<usize> {
        self.sessions.length()
    }

    async fn set(&self, sid: &str, session: Value) -> Result<()> {
        self.sessions.set(sid, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsession_core::ManualClock;
    use docsession_storage::{DocumentDb, MemoryAdapter};
    use serde_json::json;
    use std::time::Duration;

    fn document() -> SharedDocument {
        DocumentDb::open(MemoryAdapter::new()).unwrap().into_shared()
    }

    #[tokio::test]
    async fn test_touch_replaces_payload() {
        let store = DocSessionStore::new(document(), StoreConfig::new()).unwrap();

        store.set("s1", json!({"views": 1, "user": "a"})).await.unwrap();
        store.touch("s1", json!({"views": 2})).await.unwrap();

        assert_eq!(store.get("s1").await.unwrap(), Some(json!({"views": 2})));
        assert_eq!(store.length().await.unwrap(), 1);
        store.close().await;
    }

    #[tokio::test]
    async fn test_touch_restarts_ttl() {
        let clock = ManualClock::new(0);
        let store = DocSessionStore::with_clock(
            document(),
            StoreConfig::new().with_ttl(10).with_purge_disabled(true),
            Arc::new(clock.clone()),
        )
        .unwrap();

        store.set("s1", json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(8));
        store.touch("s1", json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(8));

        assert_eq!(store.purge().await.unwrap(), 0);
        assert_eq!(store.sessions().record("s1").unwrap().unwrap().expires_at, 18_000);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let store = DocSessionStore::new(document(), StoreConfig::new()).unwrap();
        assert!(store.is_purging());

        store.close().await;
        store.close().await;

        assert!(!store.is_purging());
        store.set("s1", json!(1)).await.unwrap();
        assert_eq!(store.length().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_disable_purge_starts_no_task() {
        let config = StoreConfig::new().with_purge_disabled(true);
        let store = DocSessionStore::new(document(), config).unwrap();

        assert!(!store.is_purging());
    }

    #[test]
    fn test_purge_requires_runtime() {
        let err = DocSessionStore::new(document(), StoreConfig::new()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let config = StoreConfig::new().with_purge_disabled(true);
        assert!(DocSessionStore::new(document(), config).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let config = StoreConfig::new().with_purge_interval(Duration::ZERO);
        assert!(DocSessionStore::new(document(), config).is_err());

        let config = StoreConfig::new()
            .with_ttl(10_000_000_000_000_000)
            .with_purge_disabled(true);
        let err = DocSessionStore::new(document(), config).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
