//! File-backed store: one JSON map on disk, replaced atomically on every
//! write. Change events fan out to in-process subscribers only; cross-device
//! propagation is the transport's job, not ours.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::errors::Result;
use crate::{check_quotas, new_event_channel, ChangeEvent, SyncStore};

const STORE_FILE: &str = "readmark-store.json";

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl FileStore {
    /// Opens (or creates) the store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(STORE_FILE);
        let entries: HashMap<String, String> = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            HashMap::new()
        };
        tracing::debug!(entries = entries.len(), path = %path.display(), "opened store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
            events: new_event_channel(),
        })
    }

    /// Writes `entries` beside the final path, fsyncs, then renames over it.
    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::Builder::new()
            .prefix("readmark_store_")
            .tempfile_in(dir)?;
        tmp.as_file_mut()
            .write_all(serde_json::to_string_pretty(entries)?.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SyncStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let old_value = {
            let mut entries = self.entries.lock().unwrap();
            check_quotas(&entries, key, value)?;
            let mut next = entries.clone();
            let old = next.insert(key.to_string(), value.to_string());
            // Commit to disk before memory so a failed write changes nothing.
            self.persist(&next)?;
            *entries = next;
            old
        };
        tracing::debug!(key, "persisted entry");
        let _ = self.events.send(ChangeEvent {
            key: key.to_string(),
            old_value,
            new_value: value.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StorageError;
    use crate::QUOTA_BYTES_PER_ITEM;
    use tempfile::tempdir;

    #[tokio::test]
    async fn value_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set("scp1", "AAECAw==").await.unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(store.get("scp1").await.unwrap().as_deref(), Some("AAECAw=="));
    }

    #[tokio::test]
    async fn rejected_write_leaves_disk_and_memory_alone() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("k", "keep").await.unwrap();

        let huge = "x".repeat(QUOTA_BYTES_PER_ITEM + 1);
        let err = store.set("k", &huge).await.unwrap_err();
        assert!(matches!(err, StorageError::ItemQuotaExceeded { .. }));
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("keep"));

        let reopened = FileStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get("k").await.unwrap().as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn set_emits_change_event() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let mut events = store.subscribe();
        store.set("scp1", "Zm9v").await.unwrap();
        let ev = events.recv().await.unwrap();
        assert_eq!(ev.key, "scp1");
        assert_eq!(ev.new_value, "Zm9v");
    }
}
