//! Simulated content-addressed storage and external handle index.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory state only")]

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use chainmail_core::{Commitment, ContentStore, ContentStoreError, HandleIndex, commit, keccak256};

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, Vec<u8>>,
    pinned: HashSet<String>,
    put_count: usize,
    fail_puts: bool,
    fail_pins: bool,
    put_delay: Option<Duration>,
}

/// In-memory content store.
///
/// Handles are `bafk` followed by the hex Keccak-256 of the bytes, so equal
/// bytes always get equal handles. Clones share state.
#[derive(Clone, Default)]
pub struct SimContentStore {
    state: Arc<Mutex<StoreState>>,
}

impl SimContentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("SimContentStore mutex poisoned")
    }

    /// Handle the store assigns to `bytes`.
    pub fn handle_for(bytes: &[u8]) -> String {
        format!("bafk{}", hex::encode(keccak256(bytes)))
    }

    /// Make every `put` fail with `Unavailable` until cleared.
    pub fn set_fail_puts(&self, fail: bool) {
        self.state().fail_puts = fail;
    }

    /// Make every `pin` fail with `Unavailable` until cleared.
    pub fn set_fail_pins(&self, fail: bool) {
        self.state().fail_pins = fail;
    }

    /// Delay every `put` by `delay` (tokio time, so it can be paused).
    pub fn set_put_delay(&self, delay: Option<Duration>) {
        self.state().put_delay = delay;
    }

    /// Overwrite the bytes under `handle`, bypassing content addressing.
    pub fn tamper(&self, handle: &str, bytes: Vec<u8>) {
        self.state().objects.insert(handle.to_string(), bytes);
    }

    /// Forget `handle`.
    pub fn remove(&self, handle: &str) {
        self.state().objects.remove(handle);
    }

    /// Bytes under `handle`, if stored.
    pub fn object(&self, handle: &str) -> Option<Vec<u8>> {
        self.state().objects.get(handle).cloned()
    }

    /// Number of stored objects.
    pub fn object_count(&self) -> usize {
        self.state().objects.len()
    }

    /// Number of `put` calls that reached the store.
    pub fn put_count(&self) -> usize {
        self.state().put_count
    }

    /// Whether `handle` has been pinned.
    pub fn is_pinned(&self, handle: &str) -> bool {
        self.state().pinned.contains(handle)
    }
}

#[async_trait]
impl ContentStore for SimContentStore {
    async fn put(&self, bytes: Vec<u8>) -> Result<String, ContentStoreError> {
        let delay = self.state().put_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        state.put_count += 1;
        if state.fail_puts {
            return Err(ContentStoreError::Unavailable("simulated upload failure".to_string()));
        }

        let handle = Self::handle_for(&bytes);
        state.objects.insert(handle.clone(), bytes);
        Ok(handle)
    }

    async fn get(&self, handle: &str) -> Result<Vec<u8>, ContentStoreError> {
        self.object(handle).ok_or_else(|| ContentStoreError::NotFound(handle.to_string()))
    }

    async fn pin(&self, handle: &str) -> Result<(), ContentStoreError> {
        let mut state = self.state();
        if state.fail_pins {
            return Err(ContentStoreError::Unavailable("simulated pin failure".to_string()));
        }
        if !state.objects.contains_key(handle) {
            return Err(ContentStoreError::NotFound(handle.to_string()));
        }
        state.pinned.insert(handle.to_string());
        Ok(())
    }
}

/// In-memory external commitment → handle index.
#[derive(Clone, Default)]
pub struct SimHandleIndex {
    entries: Arc<Mutex<HashMap<Commitment, String>>>,
}

impl SimHandleIndex {
    /// Empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `handle` under its commitment.
    pub fn publish(&self, handle: &str) {
        self.insert(commit(handle), handle);
    }

    /// Publish an arbitrary entry, even one that does not hash to `commitment`.
    #[allow(clippy::expect_used)]
    pub fn insert(&self, commitment: Commitment, handle: &str) {
        self.entries
            .lock()
            .expect("SimHandleIndex mutex poisoned")
            .insert(commitment, handle.to_string());
    }
}

#[async_trait]
impl HandleIndex for SimHandleIndex {
    #[allow(clippy::expect_used)]
    async fn lookup(&self, commitment: &Commitment) -> Result<Option<String>, ContentStoreError> {
        Ok(self.entries.lock().expect("SimHandleIndex mutex poisoned").get(commitment).cloned())
    }
}
