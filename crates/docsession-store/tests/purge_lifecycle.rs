//! Integration tests for the background purge task
//!
//! Time is paused, so `sleep` advances tokio's virtual clock while the
//! `ManualClock` controls record expiry.

use docsession_core::{CollectionLayout, ManualClock, StoreConfig};
use docsession_storage::{DocumentAdapter, DocumentDb, MemoryAdapter, StorageError, StorageResult};
use docsession_store::{DocSessionStore, Error, SessionStore};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const T0: i64 = 1_700_000_000_000;

// Adapter whose writes can be switched to fail
#[derive(Clone, Default)]
struct FlakyAdapter {
    failing: Arc<AtomicBool>,
    snapshot: Arc<Mutex<Option<Value>>>,
}

impl FlakyAdapter {
    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Option<Value> {
        self.snapshot.lock().unwrap().clone()
    }
}

impl DocumentAdapter for FlakyAdapter {
    fn read(&self) -> StorageResult<Option<Value>> {
        Ok(self.snapshot())
    }

    fn write(&self, state: &Value) -> StorageResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("write refused")));
        }
        *self.snapshot.lock().unwrap() = Some(state.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "flaky".to_string()
    }
}

fn open(config: StoreConfig, clock: &ManualClock) -> DocSessionStore {
    let document = DocumentDb::open(MemoryAdapter::new()).unwrap().into_shared();
    DocSessionStore::with_clock(document, config, Arc::new(clock.clone())).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_default_interval_purges_expired() {
    let clock = ManualClock::new(T0);
    let store = open(StoreConfig::new().with_ttl(1), &clock);
    assert!(store.is_purging());

    store.set("expired", json!(1)).await.unwrap();
    clock.advance(Duration::from_secs(2));
    store.set("fresh", json!(2)).await.unwrap();

    sleep(Duration::from_secs(30)).await;
    assert_eq!(store.length().await.unwrap(), 2);

    sleep(Duration::from_secs(31)).await;
    assert_eq!(store.all().await.unwrap(), vec![json!(2)]);

    store.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_custom_interval_array_layout() {
    let clock = ManualClock::new(T0);
    let config = StoreConfig::new()
        .with_layout(CollectionLayout::Array)
        .with_ttl(1)
        .with_purge_interval(Duration::from_secs(5));
    let store = open(config, &clock);

    store.set("a", json!(1)).await.unwrap();
    clock.advance(Duration::from_secs(2));

    sleep(Duration::from_secs(6)).await;
    assert_eq!(store.length().await.unwrap(), 0);

    store.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_disabled_purge_never_runs() {
    for layout in [CollectionLayout::Array, CollectionLayout::Mapping] {
        let clock = ManualClock::new(T0);
        let config = StoreConfig::new()
            .with_layout(layout)
            .with_ttl(1)
            .with_purge_disabled(true);
        let store = open(config, &clock);
        assert!(!store.is_purging());

        store.set("a", json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(2));
        sleep(Duration::from_secs(600)).await;

        assert_eq!(store.length().await.unwrap(), 1);
        assert_eq!(store.purge().await.unwrap(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn test_close_stops_purging() {
    let clock = ManualClock::new(T0);
    let store = open(StoreConfig::new().with_ttl(1), &clock);

    store.close().await;
    assert!(!store.is_purging());

    store.set("a", json!(1)).await.unwrap();
    clock.advance(Duration::from_secs(2));
    sleep(Duration::from_secs(600)).await;

    assert_eq!(store.length().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_surfaces_in_foreground_and_not_in_background() {
    let clock = ManualClock::new(T0);
    let adapter = FlakyAdapter::default();
    let document = DocumentDb::open(adapter.clone()).unwrap().into_shared();
    let store = DocSessionStore::with_clock(
        document,
        StoreConfig::new().with_ttl(1),
        Arc::new(clock.clone()),
    )
    .unwrap();

    store.set("a", json!(1)).await.unwrap();

    adapter.set_failing(true);
    let err = store.set("b", json!(2)).await.unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert!(err.to_string().contains("write refused"));

    // The background purge hits the same failure and keeps running
    clock.advance(Duration::from_secs(2));
    sleep(Duration::from_secs(61)).await;
    assert!(store.is_purging());
    assert!(adapter.snapshot().unwrap()["sessions"]["a"].is_object());

    adapter.set_failing(false);
    sleep(Duration::from_secs(60)).await;
    assert_eq!(adapter.snapshot().unwrap(), json!({"sessions": {}}));

    store.close().await;
}
