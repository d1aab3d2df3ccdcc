//! docsession Core
//!
//! This crate provides the session record manager:
//! - Record shape and TTL policy
//! - Array-backed and mapping-backed collection strategies
//! - CRUD plus purge of expired records, each flushed to the document store
//! - Store configuration and error types

pub mod clock;
pub mod collection;
pub mod config;
pub mod error;
pub mod record;
pub mod sessions;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{ArrayCollection, MappingCollection, SessionCollection};
pub use config::{CollectionLayout, StoreConfig};
pub use error::{Error, Result};
pub use record::SessionRecord;
pub use sessions::Sessions;
