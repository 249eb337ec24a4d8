//! Persistent key-value metadata used for accept-once deduplication.
//!
//! This module provides the [`MetadataStore`] trait and its backends:
//! - [`InMemoryMetadataStore`] - process-local, lost on exit
//! - [`JsonJournalStore`] - an append-only JSON Lines journal on disk shared by every process
//!   pointed at the same file
//!
//! [`connect`] opens a store from the `metadata.url` setting.

mod journal;
mod memory;

pub use journal::JsonJournalStore;
pub use memory::InMemoryMetadataStore;

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::config::MetadataSettings;
use crate::error::{StoreError, StoreResult};

/// Key-value store recording which files have already been emitted.
///
/// Check-and-set operations ([`put_if_absent`](Self::put_if_absent),
/// [`replace`](Self::replace)) are atomic with respect to every caller of the
/// same store instance. Whether they are atomic across processes depends on
/// the backend.
pub trait MetadataStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn contains(&self, key: &str) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Store a value, overwriting any previous one.
    fn put(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Store a value only if the key is absent.
    ///
    /// Returns the existing value when the key was already present, `None`
    /// when this call stored it.
    fn put_if_absent(&self, key: &str, value: &str) -> StoreResult<Option<String>>;

    /// Replace `old` with `new`, returning false if the current value is not `old`.
    fn replace(&self, key: &str, old: &str, new: &str) -> StoreResult<bool>;

    /// Remove a key, returning its previous value.
    fn remove(&self, key: &str) -> StoreResult<Option<String>>;

    /// Make every prior write durable.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }

    fn description(&self) -> String;
}

/// Where a metadata URL points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Parse `memory:`, `file:<path>`, `file://<path>` or a bare path.
    pub fn parse(url: &str) -> StoreResult<Self> {
        let url = url.trim();
        if url == "memory:" || url == "memory" {
            return Ok(StoreLocation::Memory);
        }
        if let Some(path) = url.strip_prefix("file://") {
            return Ok(StoreLocation::File(PathBuf::from(path)));
        }
        if let Some(path) = url.strip_prefix("file:") {
            return Ok(StoreLocation::File(PathBuf::from(path)));
        }
        if url.contains("://") {
            return Err(StoreError::Unavailable(format!(
                "unsupported metadata store url '{url}'"
            )));
        }
        Ok(StoreLocation::File(PathBuf::from(url)))
    }
}

/// Open the metadata store described by the settings.
pub fn connect(settings: &MetadataSettings) -> StoreResult<Arc<dyn MetadataStore>> {
    let store: Arc<dyn MetadataStore> = match StoreLocation::parse(&settings.url)? {
        StoreLocation::Memory => Arc::new(InMemoryMetadataStore::new()),
        StoreLocation::File(path) => {
            Arc::new(JsonJournalStore::open(path, &settings.collection)?)
        }
    };

    info!("Connected metadata store: {}", store.description());
    Ok(store)
}
