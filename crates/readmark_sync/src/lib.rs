//! Synchronized key-value store boundary.
//!
//! The read-state core persists one value under one well-known key and is
//! told about writes made elsewhere through a change subscription. Both
//! backends enforce the same byte quotas the real synchronized store does,
//! so callers hit quota failures locally instead of in production.

pub mod errors;
pub mod file;
pub mod memory;

pub use errors::StorageError;
pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;
use tokio::sync::broadcast;

/// Largest single entry (key bytes + value bytes) a backend accepts.
pub const QUOTA_BYTES_PER_ITEM: usize = 8192;

/// Ceiling on the summed size of all entries.
pub const QUOTA_BYTES_TOTAL: usize = 102_400;

/// Capacity of the change-event channel handed to subscribers.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notification delivered to every subscriber after a successful write.
/// The writer's own subscription receives it too.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub key: String,
    pub old_value: Option<String>,
    pub new_value: String,
}

#[async_trait::async_trait]
pub trait SyncStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Persists `value` under `key`, replacing any prior value, and fans a
    /// [`ChangeEvent`] out to subscribers. Quota violations leave the store
    /// untouched.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn subscribe(&self) -> broadcast::Receiver<ChangeEvent>;
}

fn new_event_channel() -> broadcast::Sender<ChangeEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Quota check shared by the backends. Sizes count key and value bytes,
/// with the candidate entry replacing any existing one under `key`.
fn check_quotas(
    entries: &HashMap<String, String>,
    key: &str,
    value: &str,
) -> Result<(), StorageError> {
    let item = key.len() + value.len();
    if item > QUOTA_BYTES_PER_ITEM {
        return Err(StorageError::ItemQuotaExceeded {
            got: item,
            quota: QUOTA_BYTES_PER_ITEM,
        });
    }
    let rest: usize = entries
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
    if rest + item > QUOTA_BYTES_TOTAL {
        return Err(StorageError::TotalQuotaExceeded {
            got: rest + item,
            quota: QUOTA_BYTES_TOTAL,
        });
    }
    Ok(())
}
