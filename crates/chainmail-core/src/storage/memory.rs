#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::{BTreeMap, HashMap, btree_map::Entry},
    sync::{Arc, Mutex},
};

use super::{Storage, StorageError};
use crate::{
    commitment::Commitment,
    record::{IndexedMail, UpsertOutcome},
};

/// In-memory storage implementation for testing and simulation
///
/// Mail entries live in a `BTreeMap` so listing is already ordered by id. All
/// state is wrapped in Arc<Mutex<>> to allow Clone and concurrent access.
/// Thread-safe through Mutex, but uses `lock().expect()` which will panic if
/// the mutex is poisoned - acceptable for test code.
#[derive(Clone)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Commitment -> storage handle
    handles: HashMap<Commitment, String>,

    /// Mail id -> index entry
    mail: BTreeMap<u64, IndexedMail>,

    /// Last fully applied block
    cursor: Option<u64>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(MemoryStorageInner::default())) }
    }

    /// Number of indexed mails.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn mail_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").mail.len()
    }

    /// Number of remembered commitments.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    pub fn handle_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").handles.len()
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MemoryStorage {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn remember_handle(&self, commitment: &Commitment, handle: &str) -> Result<(), StorageError> {
        self.inner
            .lock()
            .expect("Mutex poisoned")
            .handles
            .insert(*commitment, handle.to_string());

        Ok(())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn lookup_handle(&self, commitment: &Commitment) -> Result<Option<String>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").handles.get(commitment).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn upsert_mail(&self, mail: &IndexedMail) -> Result<UpsertOutcome, StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");

        let outcome = match inner.mail.entry(mail.id()) {
            Entry::Occupied(mut entry) => {
                if entry.get_mut().merge(mail) {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Unchanged
                }
            },
            Entry::Vacant(entry) => {
                entry.insert(mail.clone());
                UpsertOutcome::Inserted
            },
        };

        Ok(outcome)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn load_mail(&self, mail_id: u64) -> Result<Option<IndexedMail>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").mail.get(&mail_id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn list_mail(&self) -> Result<Vec<IndexedMail>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").mail.values().cloned().collect())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn sync_cursor(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").cursor)
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned. This is acceptable for test
    /// code.
    #[allow(clippy::expect_used)]
    fn advance_sync_cursor(&self, block: u64) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.cursor = Some(inner.cursor.map_or(block, |current| current.max(block)));

        Ok(())
    }
}
