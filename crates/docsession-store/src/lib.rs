//! docsession session store
//!
//! This crate exposes the session store contract consumed by HTTP session
//! middleware, backed by a [`Sessions`](docsession_core::Sessions) manager:
//! - `all`, `clear`, `destroy`, `get`, `length`, `set`, `touch`
//! - A background purge task for expired sessions, stopped by `close()`
//!
//! # Example
//! ```no_run
//! # use docsession_store::{DocSessionStore, SessionStore};
//! # use docsession_core::StoreConfig;
//! # use docsession_storage::{DocumentDb, JsonFileAdapter};
//! # async fn example() -> docsession_core::Result<()> {
//! let document = DocumentDb::open(JsonFileAdapter::new("sessions.json"))?.into_shared();
//! let store = DocSessionStore::new(document, StoreConfig::new().with_ttl(3600))?;
//!
//! store.set("sid", serde_json::json!({"user": "a"})).await?;
//! let session = store.get("sid").await?;
//!
//! store.close().await;
//! # Ok(())
//! # }
//! ```

pub mod purge;
mod store;

pub use docsession_core::{Error, Result, StoreConfig};
pub use purge::{PurgeTask, spawn_purge_task};
pub use store::{DocSessionStore, SessionStore};
