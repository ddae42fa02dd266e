//! In-process backend. Used by tests and by callers that want the full
//! subscription semantics without touching disk.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;

use crate::errors::Result;
use crate::{check_quotas, new_event_channel, ChangeEvent, SyncStore};

pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<ChangeEvent>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events: new_event_channel(),
        }
    }

    /// Total stored bytes, for quota assertions in tests.
    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SyncStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let old_value = {
            let mut entries = self.entries.lock().unwrap();
            check_quotas(&entries, key, value)?;
            entries.insert(key.to_string(), value.to_string())
        };
        // No subscribers is fine; the send error carries nothing useful.
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
