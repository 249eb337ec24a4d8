use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use super::MetadataStore;
use crate::error::{StoreError, StoreResult};

/// One line of the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Record {
    Header { collection: String },
    Put { key: String, value: String },
    Remove { key: String },
}

fn encode(record: &Record) -> StoreResult<Vec<u8>> {
    let mut line = serde_json::to_vec(record)?;
    line.push(b'\n');
    Ok(line)
}

/// Distinguishes a replaced journal from one that was appended to
#[cfg(unix)]
fn file_identity(metadata: &fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ino())
}

#[cfg(not(unix))]
fn file_identity(metadata: &fs::Metadata) -> Option<u64> {
    metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos() as u64)
}

#[derive(Debug, Default)]
struct Cache {
    entries: BTreeMap<String, String>,
    identity: Option<u64>,
    /// Bytes of the journal already applied to `entries`
    offset: u64,
    /// Set after a failed append; forces a full reload
    stale: bool,
}

/// Metadata store kept in an append-only JSON Lines journal.
///
/// The first line names the collection; every later line is a `put` or
/// `remove` record. Each mutation appends one record and syncs it, and
/// opening the store compacts the journal into one `put` per live key
/// through a temporary file and an atomic rename.
///
/// Other handles and processes are picked up by reading the records
/// appended since the last operation. A journal replaced by compaction has
/// a new inode and is reloaded in full. Check-and-set is atomic within this
/// process only; two processes racing on the same key can both observe it
/// as absent.
#[derive(Debug)]
pub struct JsonJournalStore {
    path: PathBuf,
    collection: String,
    cache: Mutex<Cache>,
}

fn unavailable(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", path.display(), err))
}

impl JsonJournalStore {
    /// Open (or create) the journal for a collection and compact it
    ///
    /// # Arguments
    /// * `path` - Location of the journal; parent directories are created
    /// * `collection` - Collection name the journal must carry
    pub fn open(path: impl Into<PathBuf>, collection: &str) -> StoreResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| unavailable(parent, e))?;
        }

        let store = Self {
            path,
            collection: collection.to_string(),
            cache: Mutex::new(Cache::default()),
        };

        {
            let mut cache = store.lock()?;
            match fs::metadata(&store.path) {
                Ok(_) => store.reload(&mut cache)?,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(unavailable(&store.path, e)),
            }
            store.compact(&mut cache)?;
            debug!(
                "Opened metadata journal {} ({} entries)",
                store.path.display(),
                cache.entries.len()
            );
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Cache>> {
        self.cache
            .lock()
            .map_err(|_| StoreError::Unavailable("metadata lock poisoned".to_string()))
    }

    fn apply(&self, record: Record, entries: &mut BTreeMap<String, String>) -> StoreResult<()> {
        match record {
            Record::Header { collection } if collection != self.collection => {
                Err(StoreError::CollectionMismatch {
                    expected: self.collection.clone(),
                    found: collection,
                })
            }
            Record::Header { .. } => Ok(()),
            Record::Put { key, value } => {
                entries.insert(key, value);
                Ok(())
            }
            Record::Remove { key } => {
                entries.remove(&key);
                Ok(())
            }
        }
    }

    /// Apply every complete record from `from` on
    ///
    /// # Returns
    /// The offset just past the last complete line. A trailing line without
    /// its newline is still being written (or was torn) and is left unread.
    fn read_records(&self, from: u64, entries: &mut BTreeMap<String, String>) -> StoreResult<u64> {
        let mut file = File::open(&self.path).map_err(|e| unavailable(&self.path, e))?;
        file.seek(SeekFrom::Start(from))
            .map_err(|e| unavailable(&self.path, e))?;

        let mut reader = BufReader::new(file);
        let mut offset = from;
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = reader
                .read_until(b'\n', &mut line)
                .map_err(|e| unavailable(&self.path, e))?;
            if read == 0 || line.last() != Some(&b'\n') {
                break;
            }
            offset += read as u64;
            let record: Record = serde_json::from_slice(&line)?;
            self.apply(record, entries)?;
        }

        Ok(offset)
    }

    fn reload(&self, cache: &mut Cache) -> StoreResult<()> {
        let metadata = fs::metadata(&self.path).map_err(|e| unavailable(&self.path, e))?;
        let mut entries = BTreeMap::new();
        let offset = self.read_records(0, &mut entries)?;

        cache.entries = entries;
        cache.identity = file_identity(&metadata);
        cache.offset = offset;
        cache.stale = false;
        Ok(())
    }

    /// Catch up with records written by other handles
    fn refresh(&self, cache: &mut Cache) -> StoreResult<()> {
        let metadata = fs::metadata(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::Unavailable(format!(
                "{}: metadata journal disappeared",
                self.path.display()
            )),
            _ => unavailable(&self.path, e),
        })?;

        let replaced = cache.identity != file_identity(&metadata);
        if cache.stale || replaced || metadata.len() < cache.offset {
            self.reload(cache)
        } else if metadata.len() > cache.offset {
            let from = cache.offset;
            cache.offset = self.read_records(from, &mut cache.entries)?;
            Ok(())
        } else {
            Ok(())
        }
    }

    /// Rewrite the journal as a header plus one `put` per live key
    fn compact(&self, cache: &mut Cache) -> StoreResult<()> {
        let tmp_path = PathBuf::from(format!("{}.tmp", self.path.display()));
        let file = File::create(&tmp_path).map_err(|e| unavailable(&tmp_path, e))?;
        let mut writer = BufWriter::new(file);

        let header = Record::Header {
            collection: self.collection.clone(),
        };
        writer
            .write_all(&encode(&header)?)
            .map_err(|e| unavailable(&tmp_path, e))?;
        for (key, value) in &cache.entries {
            let record = Record::Put {
                key: key.clone(),
                value: value.clone(),
            };
            writer
                .write_all(&encode(&record)?)
                .map_err(|e| unavailable(&tmp_path, e))?;
        }
        writer.flush().map_err(|e| unavailable(&tmp_path, e))?;
        writer
            .get_ref()
            .sync_all()
            .map_err(|e| unavailable(&tmp_path, e))?;
        drop(writer);

        fs::rename(&tmp_path, &self.path).map_err(|e| unavailable(&self.path, e))?;

        let metadata = fs::metadata(&self.path).map_err(|e| unavailable(&self.path, e))?;
        cache.identity = file_identity(&metadata);
        cache.offset = metadata.len();
        cache.stale = false;
        Ok(())
    }

    /// Append one record and sync it
    fn append(&self, cache: &mut Cache, record: &Record) -> StoreResult<()> {
        let line = encode(record)?;
        let written = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .and_then(|mut file| {
                file.write_all(&line)?;
                file.sync_data()
            });

        if let Err(e) = written {
            // Cut a torn record so the next append starts on a line boundary
            if let Err(truncate_err) = OpenOptions::new()
                .write(true)
                .open(&self.path)
                .and_then(|file| file.set_len(cache.offset))
            {
                warn!(
                    "Could not truncate {} after a failed append: {}",
                    self.path.display(),
                    truncate_err
                );
            }
            cache.stale = true;
            return Err(unavailable(&self.path, e));
        }
        Ok(())
    }

    /// Decide a change under the lock and journal it
    ///
    /// `change` returns the operation result and the record to append, if
    /// any. The record reaches `entries` by replaying the journal tail, which
    /// also applies anything other handles appended meanwhile.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&BTreeMap<String, String>) -> (T, Option<Record>),
    ) -> StoreResult<T> {
        let mut cache = self.lock()?;
        self.refresh(&mut cache)?;

        let (result, record) = change(&cache.entries);
        if let Some(record) = record {
            self.append(&mut cache, &record)?;
            let from = cache.offset;
            cache.offset = self.read_records(from, &mut cache.entries)?;
        }
        Ok(result)
    }
}

impl MetadataStore for JsonJournalStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut cache = self.lock()?;
        self.refresh(&mut cache)?;
        Ok(cache.entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> StoreResult<()> {
        self.mutate(|entries| {
            let record = (entries.get(key).map(String::as_str) != Some(value)).then(|| {
                Record::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                }
            });
            ((), record)
        })
    }

    fn put_if_absent(&self, key: &str, value: &str) -> StoreResult<Option<String>> {
        self.mutate(|entries| match entries.get(key) {
            Some(existing) => (Some(existing.clone()), None),
            None => (
                None,
                Some(Record::Put {
                    key: key.to_string(),
                    value: value.to_string(),
                }),
            ),
        })
    }

    fn replace(&self, key: &str, old: &str, new: &str) -> StoreResult<bool> {
        self.mutate(|entries| match entries.get(key) {
            Some(current) if current == old => (
                true,
                Some(Record::Put {
                    key: key.to_string(),
                    value: new.to_string(),
                }),
            ),
            _ => (false, None),
        })
    }

    fn remove(&self, key: &str) -> StoreResult<Option<String>> {
        self.mutate(|entries| match entries.get(key) {
            Some(previous) => (
                Some(previous.clone()),
                Some(Record::Remove {
                    key: key.to_string(),
                }),
            ),
            None => (None, None),
        })
    }

    fn flush(&self) -> StoreResult<()> {
        // Records are synced as they are appended; this only checks the journal is reachable
        let mut cache = self.lock()?;
        self.refresh(&mut cache)
    }

    fn description(&self) -> String {
        format!("journal({}, collection='{}')", self.path.display(), self.collection)
    }
}
