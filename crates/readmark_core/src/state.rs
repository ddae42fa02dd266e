//! Read-state ownership and synchronization.
//!
//! One [`ReadStateStore`] owns the whole bit buffer and is the only thing
//! that mutates it. Local toggles flip the in-memory flag first and then
//! persist the full encoded buffer under [`STORE_KEY`], so reads in the same
//! process observe a toggle before its write settles. Writes observed from
//! elsewhere replace the buffer wholesale: the store is last-write-wins at
//! key granularity, and a toggle racing a remote write can lose.

use std::sync::{Arc, Mutex};

use readmark_sync::{ChangeEvent, SyncStore};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::bitset::BitSet;
use crate::consts::{BIT_OFF, BIT_ON, STATE_CAPACITY, STORE_KEY};
use crate::errors::{ReadmarkError, Result};
use crate::ident;

pub struct ReadStateStore {
    store: Arc<dyn SyncStore>,
    state: Arc<Mutex<BitSet>>,
    revision: watch::Receiver<u64>,
    listener: Option<JoinHandle<()>>,
}

impl ReadStateStore {
    /// Loads whatever is persisted under [`STORE_KEY`] (absent value means
    /// an all-clear state) and registers for external changes to that key.
    /// This is the only startup I/O; a failed load or an undecodable stored
    /// value surfaces here and nothing is constructed.
    pub async fn initialize(store: Arc<dyn SyncStore>) -> Result<Self> {
        Self::with_capacity(store, STATE_CAPACITY).await
    }

    pub async fn with_capacity(store: Arc<dyn SyncStore>, capacity: usize) -> Result<Self> {
        let mut bits = BitSet::new(capacity);
        if let Some(value) = store.get(STORE_KEY).await? {
            bits.decode(&value)?;
        }
        let state = Arc::new(Mutex::new(bits));
        let (tx, revision) = watch::channel(0u64);
        let listener = tokio::spawn(listen(store.subscribe(), Arc::clone(&state), tx));
        Ok(Self {
            store,
            state,
            revision,
            listener: Some(listener),
        })
    }

    /// Re-runs the load step. Safe to call on a live store; toggles that
    /// were already persisted come back unchanged.
    pub async fn reload(&self) -> Result<()> {
        if let Some(value) = self.store.get(STORE_KEY).await? {
            self.state.lock().unwrap().decode(&value)?;
        }
        Ok(())
    }

    fn resolve(identifier: &str) -> Result<usize> {
        ident::extract_index(identifier)
            .ok_or_else(|| ReadmarkError::UnsupportedIdentifier(identifier.to_string()))
    }

    /// Whether the item named by `identifier` is marked read.
    pub fn get_state(&self, identifier: &str) -> Result<bool> {
        let index = Self::resolve(identifier)?;
        Ok(self.state.lock().unwrap().get(index)? == BIT_ON)
    }

    /// Flips the read flag for `identifier` and persists the whole buffer.
    /// Resolves to the new value once the write settles; a failed write
    /// comes back as [`ReadmarkError::Storage`] with the in-memory flip
    /// already applied (local reads keep seeing it).
    pub async fn toggle_state(&self, identifier: &str) -> Result<bool> {
        let index = Self::resolve(identifier)?;
        let (next, encoded) = {
            let mut state = self.state.lock().unwrap();
            let next = if state.get(index)? == BIT_ON {
                BIT_OFF
            } else {
                BIT_ON
            };
            state.set(index, next)?;
            (next, state.encode())
        };
        self.store.set(STORE_KEY, &encoded).await?;
        Ok(next == BIT_ON)
    }

    /// Ascending indices whose flag is set (`matched == true`) or clear.
    pub fn all_indices(&self, matched: bool) -> Vec<usize> {
        let want = if matched { BIT_ON } else { BIT_OFF };
        self.state.lock().unwrap().select_indices(|bit, _| bit == want)
    }

    /// The persisted text form of the current state.
    pub fn export(&self) -> String {
        self.state.lock().unwrap().encode()
    }

    /// Ticks once per applied external update.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.clone()
    }

    /// Tears down the change listener. Also runs on drop.
    pub fn close(&mut self) {
        if let Some(task) = self.listener.take() {
            task.abort();
        }
    }
}

impl Drop for ReadStateStore {
    fn drop(&mut self) {
        self.close();
    }
}

/// Applies external writes to [`STORE_KEY`] as unconditional overwrites.
/// Undecodable payloads are reported and skipped, leaving prior state in
/// place; any pending local mutation that never persisted is simply gone,
/// which is the documented last-write-wins behavior.
async fn listen(
    mut events: broadcast::Receiver<ChangeEvent>,
    state: Arc<Mutex<BitSet>>,
    revision: watch::Sender<u64>,
) {
    loop {
        match events.recv().await {
            Ok(event) if event.key == STORE_KEY => {
                let applied = state.lock().unwrap().decode(&event.new_value);
                match applied {
                    Ok(()) => revision.send_modify(|rev| *rev += 1),
                    Err(err) => {
                        tracing::error!(%err, "discarding undecodable state update")
                    }
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "state update stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use readmark_sync::MemoryStore;

    async fn fresh() -> (Arc<MemoryStore>, ReadStateStore) {
        let store = Arc::new(MemoryStore::new());
        let reads = ReadStateStore::initialize(store.clone()).await.unwrap();
        (store, reads)
    }

    #[tokio::test]
    async fn toggle_flips_and_reports_the_new_value() {
        let (_store, reads) = fresh().await;
        assert!(!reads.get_state("scp-42").unwrap());
        assert!(reads.toggle_state("scp-42").await.unwrap());
        assert!(reads.get_state("scp-42").unwrap());
        assert!(!reads.toggle_state("scp-42").await.unwrap());
        assert!(!reads.get_state("scp-42").unwrap());
    }

    #[tokio::test]
    async fn unsupported_identifier_fails_before_any_mutation() {
        let (store, reads) = fresh().await;
        assert!(matches!(
            reads.get_state("http://x/no-match"),
            Err(ReadmarkError::UnsupportedIdentifier(_))
        ));
        assert!(matches!(
            reads.toggle_state("http://x/no-match").await,
            Err(ReadmarkError::UnsupportedIdentifier(_))
        ));
        // Nothing was persisted either.
        assert_eq!(store.get(STORE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn index_past_capacity_is_rejected() {
        let (_store, reads) = fresh().await;
        assert!(matches!(
            reads.get_state("scp-20000"),
            Err(ReadmarkError::IndexOutOfRange { .. })
        ));
    }

    #[tokio::test]
    async fn double_toggle_cancels_in_all_indices() {
        let (_store, reads) = fresh().await;
        reads.toggle_state("scp-5").await.unwrap();
        reads.toggle_state("scp-10").await.unwrap();
        reads.toggle_state("scp-5").await.unwrap();
        assert_eq!(reads.all_indices(true), vec![10]);
        assert!(!reads.all_indices(false).contains(&10));
    }

    #[tokio::test]
    async fn initialize_picks_up_persisted_state() {
        let (store, reads) = fresh().await;
        reads.toggle_state("scp-7").await.unwrap();
        drop(reads);

        let again = ReadStateStore::initialize(store).await.unwrap();
        assert!(again.get_state("scp-7").unwrap());
        assert_eq!(again.all_indices(true), vec![7]);
    }

    #[tokio::test]
    async fn reload_keeps_persisted_toggles() {
        let (_store, reads) = fresh().await;
        reads.toggle_state("scp-7").await.unwrap();
        reads.reload().await.unwrap();
        assert!(reads.get_state("scp-7").unwrap());
    }

    #[tokio::test]
    async fn external_update_replaces_local_state() {
        let (store, reads) = fresh().await;
        let mut revisions = reads.subscribe();

        // Another device marks item 7 read.
        let mut remote = BitSet::new(STATE_CAPACITY);
        remote.set(7, BIT_ON).unwrap();
        store.set(STORE_KEY, &remote.encode()).await.unwrap();

        revisions.changed().await.unwrap();
        assert!(reads.get_state("scp-7").unwrap());
        assert_eq!(reads.all_indices(true), vec![7]);
    }

    #[tokio::test]
    async fn undecodable_external_update_is_skipped() {
        let (store, reads) = fresh().await;
        let mut revisions = reads.subscribe();
        reads.toggle_state("scp-3").await.unwrap();
        revisions.changed().await.unwrap(); // own write applied

        store.set(STORE_KEY, "???not-base64???").await.unwrap();
        // Events arrive in order, so a later decodable write proves the bad
        // payload was skipped rather than applied.
        let mut remote = BitSet::new(STATE_CAPACITY);
        remote.set(8, BIT_ON).unwrap();
        store.set(STORE_KEY, &remote.encode()).await.unwrap();

        revisions.changed().await.unwrap();
        assert_eq!(*revisions.borrow(), 2); // bad payload never bumped
        assert!(reads.get_state("scp-8").unwrap());
        assert!(!reads.get_state("scp-3").unwrap()); // overwritten, not merged
    }

    #[tokio::test]
    async fn failed_persist_keeps_the_local_flip_visible() {
        // A capacity big enough that the encoded buffer blows the per-item
        // quota: 70000 bits -> 8750 bytes -> ~11.7 KB of base64.
        let store = Arc::new(MemoryStore::new());
        let reads = ReadStateStore::with_capacity(store, 70_000).await.unwrap();
        let err = reads.toggle_state("scp-42").await.unwrap_err();
        assert!(matches!(err, ReadmarkError::Storage(_)));
        assert!(reads.get_state("scp-42").unwrap());
    }
}
