use std::collections::HashMap;
use std::sync::Mutex;

use super::MetadataStore;
use crate::error::{StoreError, StoreResult};

/// Process-local metadata store.
///
/// Nothing survives a restart, so files are emitted again after one. Useful
/// for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    entries: Mutex<HashMap<String, String>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, String>) -> T) -> StoreResult<T> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("metadata lock poisoned".to_string()))?;
        Ok(f(&mut entries))
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries| entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn put_if_absent(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries| match entries.get(key) {
            Some(existing) => Some(existing.clone()),
            None => {
                entries.insert(key.to_string(), value.to_string());
                None
            }
        })
    }

    fn replace(&self, key: &str, old: &str, new: &str) -> StoreResult<bool> {
        self.with_entries(|entries| match entries.get_mut(key) {
            Some(current) if current == old => {
                *current = new.to_string();
                true
            }
            _ => false,
        })
    }

    fn remove(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_entries(|entries| entries.remove(key))
    }

    fn description(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_put_if_absent() {
        let store = InMemoryMetadataStore::new();

        assert_eq!(store.put_if_absent("k", "1").unwrap(), None);
        assert_eq!(store.put_if_absent("k", "2").unwrap(), Some("1".to_string()));
        assert_eq!(store.get("k").unwrap(), Some("1".to_string()));
    }

    #[test]
    fn test_replace_and_remove() {
        let store = InMemoryMetadataStore::new();
        store.put("k", "1").unwrap();

        assert!(!store.replace("k", "0", "2").unwrap());
        assert!(store.replace("k", "1", "2").unwrap());
        assert!(!store.replace("missing", "1", "2").unwrap());
        assert_eq!(store.remove("k").unwrap(), Some("2".to_string()));
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_if_absent_is_atomic_across_threads() {
        let store = Arc::new(InMemoryMetadataStore::new());
        let mut handles = vec![];

        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store.put_if_absent("shared", &i.to_string()).unwrap().is_none()
            }));
        }

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }
}
