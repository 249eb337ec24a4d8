use std::sync::Arc;
use tracing::debug;

use super::FileFilter;
use crate::error::Result;
use crate::metadata::MetadataStore;
use crate::scanner::{FileCandidate, IdentifierKind};

/// Accepts each file at most once across restarts.
///
/// The first acceptance stores `<prefix><identifier>` with the file's
/// modification time as value. With `reaccept_modified` a seen file is let
/// through again once its modification time differs from the stored one.
pub struct PersistentAcceptOnceFilter {
    store: Arc<dyn MetadataStore>,
    prefix: String,
    identifier: IdentifierKind,
    reaccept_modified: bool,
}

impl PersistentAcceptOnceFilter {
    /// Create a filter over a metadata store
    ///
    /// # Arguments
    /// * `store` - Shared metadata store
    /// * `prefix` - Prepended to every identifier to form the store key
    pub fn new(store: Arc<dyn MetadataStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            identifier: IdentifierKind::default(),
            reaccept_modified: false,
        }
    }

    pub fn with_identifier(mut self, identifier: IdentifierKind) -> Self {
        self.identifier = identifier;
        self
    }

    pub fn with_reaccept_modified(mut self, reaccept_modified: bool) -> Self {
        self.reaccept_modified = reaccept_modified;
        self
    }

    /// Store key for a candidate
    pub fn key_for(&self, candidate: &FileCandidate) -> Result<String> {
        Ok(format!("{}{}", self.prefix, self.identifier.identify(candidate)?))
    }
}

impl FileFilter for PersistentAcceptOnceFilter {
    fn accept(&self, candidate: &FileCandidate) -> Result<bool> {
        let key = self.key_for(candidate)?;
        let value = candidate.modified_millis().to_string();

        match self.store.put_if_absent(&key, &value)? {
            None => Ok(true),
            Some(previous) if self.reaccept_modified && previous != value => {
                let replaced = self.store.replace(&key, &previous, &value)?;
                if replaced {
                    debug!("Re-accepting modified file {}", candidate.path.display());
                }
                Ok(replaced)
            }
            Some(_) => Ok(false),
        }
    }

    fn rollback(&self, candidate: &FileCandidate) -> Result<()> {
        let key = self.key_for(candidate)?;
        self.store.remove(&key)?;
        Ok(())
    }

    fn description(&self) -> String {
        format!(
            "accept_once(prefix='{}', store={})",
            self.prefix,
            self.store.description()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;
    use std::path::PathBuf;
    use std::time::{Duration, UNIX_EPOCH};

    fn make_candidate(path: &str, modified_ms: u64) -> FileCandidate {
        FileCandidate {
            path: PathBuf::from(path),
            relative_path: PathBuf::from(path),
            size: 1,
            modified: Some(UNIX_EPOCH + Duration::from_millis(modified_ms)),
        }
    }

    #[test]
    fn test_accepts_once() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let filter = PersistentAcceptOnceFilter::new(store.clone(), "seen-files");
        let candidate = make_candidate("/in/a.txt", 1000);

        assert!(filter.accept(&candidate).unwrap());
        assert!(!filter.accept(&candidate).unwrap());
        assert_eq!(
            store.get("seen-files/in/a.txt").unwrap(),
            Some("1000".to_string())
        );
    }

    #[test]
    fn test_modified_file_is_rejected_by_default() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let filter = PersistentAcceptOnceFilter::new(store, "seen-files");

        assert!(filter.accept(&make_candidate("/in/a.txt", 1000)).unwrap());
        assert!(!filter.accept(&make_candidate("/in/a.txt", 2000)).unwrap());
    }

    #[test]
    fn test_reaccept_modified() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let filter =
            PersistentAcceptOnceFilter::new(store.clone(), "seen-files").with_reaccept_modified(true);

        assert!(filter.accept(&make_candidate("/in/a.txt", 1000)).unwrap());
        assert!(!filter.accept(&make_candidate("/in/a.txt", 1000)).unwrap());
        assert!(filter.accept(&make_candidate("/in/a.txt", 2000)).unwrap());
        assert_eq!(
            store.get("seen-files/in/a.txt").unwrap(),
            Some("2000".to_string())
        );
    }

    #[test]
    fn test_rollback_allows_reacceptance() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let filter = PersistentAcceptOnceFilter::new(store.clone(), "seen-files");
        let candidate = make_candidate("/in/a.txt", 1000);

        assert!(filter.accept(&candidate).unwrap());
        filter.rollback(&candidate).unwrap();
        assert!(store.is_empty());
        assert!(filter.accept(&candidate).unwrap());
    }
}
