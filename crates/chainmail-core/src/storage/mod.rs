//! Local storage for the commitment map, mail index and sync cursor
//!
//! Trait-based abstraction so the protocol runs unchanged against memory
//! (tests, simulation) and redb (durable). The trait is synchronous: every
//! operation is a local lookup or a single short transaction.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;

pub use self::redb::RedbStorage;
use crate::{
    commitment::Commitment,
    ids::IdentityId,
    record::{Folder, IndexedMail, UpsertOutcome},
};

/// Storage abstraction for the local index
///
/// Must be Clone (shared between dispatch, ingestion and mailbox), Send + Sync
/// (thread-safe), and synchronous (no async methods). Implementations share
/// internal state via Arc, so clones access the same underlying storage.
///
/// # Panics
///
/// Implementations may panic if internal synchronization primitives are
/// poisoned (a thread panicked while holding a lock). Acceptable for
/// test/simulation code, but production implementations should handle poisoned
/// mutexes gracefully.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Record the handle a commitment was computed from.
    ///
    /// Last writer wins. Writers for one commitment always agree, since the
    /// commitment is a digest of the handle.
    fn remember_handle(&self, commitment: &Commitment, handle: &str) -> Result<(), StorageError>;

    /// Handle recorded for a commitment, if any.
    fn lookup_handle(&self, commitment: &Commitment) -> Result<Option<String>, StorageError>;

    /// Insert or merge an index entry keyed by mail id.
    ///
    /// # Invariants
    ///
    /// - Post: fields already set on the stored entry are never erased
    /// - Post: applying the same entry twice equals applying it once
    fn upsert_mail(&self, mail: &IndexedMail) -> Result<UpsertOutcome, StorageError>;

    /// Index entry for a mail id.
    fn load_mail(&self, mail_id: u64) -> Result<Option<IndexedMail>, StorageError>;

    /// Every index entry, ordered by mail id.
    fn list_mail(&self) -> Result<Vec<IndexedMail>, StorageError>;

    /// Entries in `identity`'s `folder`, ordered by mail id.
    fn list_folder(
        &self,
        folder: Folder,
        identity: &IdentityId,
    ) -> Result<Vec<IndexedMail>, StorageError> {
        let mut mail = self.list_mail()?;
        mail.retain(|entry| folder.holds(entry, identity));
        Ok(mail)
    }

    /// Last block ingestion fully applied. `None` before the first sync.
    fn sync_cursor(&self) -> Result<Option<u64>, StorageError>;

    /// Move the sync cursor forward.
    ///
    /// # Invariants
    ///
    /// - Post: the cursor never decreases; an older block is a no-op
    fn advance_sync_cursor(&self, block: u64) -> Result<(), StorageError>;
}
