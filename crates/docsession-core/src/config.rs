//! Session store configuration

use crate::collection::{ArrayCollection, MappingCollection, SessionCollection};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default time-to-live: 24 hours
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Longest accepted TTL: 100 years
pub const MAX_TTL_SECS: u64 = 100 * 365 * 86_400;

/// Default namespace key for the session collection
pub const DEFAULT_NAMESPACE: &str = "sessions";

/// Default purge period
pub const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60;

/// Shape of the session collection inside the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionLayout {
    /// Ordered array of `{ "_id", "session", "expires" }`
    Array,
    /// Object keyed by session id
    #[default]
    Mapping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Seconds until a record expires (unset or 0 means 24 hours)
    #[serde(default)]
    pub ttl: Option<u64>,

    /// Key the collection is nested under; `null` stores it at the document root
    ///
    /// TOML has no null, so an empty string also means the root.
    #[serde(default = "default_namespace")]
    pub namespace: Option<String>,

    /// Do not start the periodic purge task
    #[serde(default, alias = "disablePurge")]
    pub disable_purge: bool,

    /// Seconds between purge runs
    #[serde(default = "default_purge_interval_secs", alias = "purgeIntervalSecs")]
    pub purge_interval_secs: u64,

    /// Collection layout
    #[serde(default)]
    pub layout: CollectionLayout,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: None,
            namespace: default_namespace(),
            disable_purge: false,
            purge_interval_secs: default_purge_interval_secs(),
            layout: CollectionLayout::default(),
        }
    }
}

fn default_namespace() -> Option<String> {
    Some(DEFAULT_NAMESPACE.to_string())
}

fn default_purge_interval_secs() -> u64 {
    DEFAULT_PURGE_INTERVAL_SECS
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the TTL in seconds
    pub fn with_ttl(mut self, secs: u64) -> Self {
        self.ttl = Some(secs);
        self
    }

    /// Nest the collection under `namespace`
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Store the collection at the document root
    pub fn without_namespace(mut self) -> Self {
        self.namespace = None;
        self
    }

    /// Enable or disable the periodic purge task
    pub fn with_purge_disabled(mut self, disabled: bool) -> Self {
        self.disable_purge = disabled;
        self
    }

    /// Set the purge period
    pub fn with_purge_interval(mut self, interval: Duration) -> Self {
        self.purge_interval_secs = interval.as_secs();
        self
    }

    pub fn with_layout(mut self, layout: CollectionLayout) -> Self {
        self.layout = layout;
        self
    }

    /// TTL with the 24 hour fallback applied
    pub fn effective_ttl(&self) -> Duration {
        match self.ttl {
            Some(secs) if secs > 0 => Duration::from_secs(secs),
            _ => Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    /// Namespace with the empty-string-means-root rule applied
    pub fn effective_namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }

    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Build the collection strategy this configuration describes
    pub fn collection(&self) -> Box<dyn SessionCollection> {
        match (self.layout, self.effective_namespace()) {
            (CollectionLayout::Array, Some(ns)) => Box::new(ArrayCollection::new(ns)),
            (CollectionLayout::Array, None) => Box::new(ArrayCollection::at_root()),
            (CollectionLayout::Mapping, Some(ns)) => Box::new(MappingCollection::new(ns)),
            (CollectionLayout::Mapping, None) => Box::new(MappingCollection::at_root()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.disable_purge && self.purge_interval_secs == 0 {
            return Err(Error::Config(
                "purge_interval_secs must be at least 1 when purging is enabled".to_string(),
            ));
        }

        if let Some(ttl) = self.ttl
            && ttl > MAX_TTL_SECS
        {
            return Err(Error::Config(format!(
                "ttl must be at most {} seconds, got {}",
                MAX_TTL_SECS, ttl
            )));
        }

        Ok(())
    }

    /// Load a configuration file, picking the format from its extension
    ///
    /// `.yaml`/`.yml` and `.toml` are recognized; anything else is read as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .map_err(|e| Error::Config(format!("YAML parse error: {}", e)))?,
            Some("toml") => toml::from_str(&content)
                .map_err(|e| Error::Config(format!("TOML parse error: {}", e)))?,
            _ => serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("JSON parse error: {}", e)))?,
        };

        config.validate()?;
        Ok(config)
    }
}
