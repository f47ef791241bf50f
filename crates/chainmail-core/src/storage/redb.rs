//! Redb-backed durable storage implementation.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. The
//! commitment map, mail index and sync cursor all survive restarts, so a
//! restarted ingestor resumes from its cursor instead of block zero.

use std::{fmt::Display, path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};

use super::{Storage, StorageError};
use crate::{
    commitment::Commitment,
    record::{IndexedMail, UpsertOutcome},
};

/// Table: handles
/// Key: commitment [32 bytes]
/// Value: UTF-8 storage handle
const HANDLES: TableDefinition<&[u8], &str> = TableDefinition::new("handles");

/// Table: mail
/// Key: mail id
/// Value: CBOR-encoded IndexedMail
const MAIL: TableDefinition<u64, &[u8]> = TableDefinition::new("mail");

/// Table: meta
/// Key: setting name
/// Value: u64
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const SYNC_CURSOR_KEY: &str = "sync_cursor";

fn io<E: Display>(err: E) -> StorageError {
    StorageError::Io(err.to_string())
}

fn encode_mail(mail: &IndexedMail) -> Result<Vec<u8>, StorageError> {
    let mut bytes = Vec::new();
    ciborium::into_writer(mail, &mut bytes)
        .map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(bytes)
}

fn decode_mail(bytes: &[u8]) -> Result<IndexedMail, StorageError> {
    ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))
}

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// Creates tables if they don't exist (HANDLES, MAIL, META).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(HANDLES).map_err(io)?;
            let _ = txn.open_table(MAIL).map_err(io)?;
            let _ = txn.open_table(META).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn remember_handle(&self, commitment: &Commitment, handle: &str) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(HANDLES).map_err(io)?;
            table.insert(commitment.as_bytes().as_slice(), handle).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn lookup_handle(&self, commitment: &Commitment) -> Result<Option<String>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(HANDLES).map_err(io)?;

        Ok(table
            .get(commitment.as_bytes().as_slice())
            .map_err(io)?
            .map(|value| value.value().to_string()))
    }

    fn upsert_mail(&self, mail: &IndexedMail) -> Result<UpsertOutcome, StorageError> {
        let txn = self.db.begin_write().map_err(io)?;

        let outcome = {
            let mut table = txn.open_table(MAIL).map_err(io)?;

            let existing = match table.get(mail.id()).map_err(io)? {
                Some(value) => Some(decode_mail(value.value())?),
                None => None,
            };

            let (merged, outcome) = match existing {
                Some(mut stored) => {
                    if stored.merge(mail) {
                        (Some(stored), UpsertOutcome::Updated)
                    } else {
                        (None, UpsertOutcome::Unchanged)
                    }
                },
                None => (Some(mail.clone()), UpsertOutcome::Inserted),
            };

            if let Some(entry) = merged {
                let bytes = encode_mail(&entry)?;
                table.insert(mail.id(), bytes.as_slice()).map_err(io)?;
            }

            outcome
        };

        txn.commit().map_err(io)?;

        Ok(outcome)
    }

    fn load_mail(&self, mail_id: u64) -> Result<Option<IndexedMail>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(MAIL).map_err(io)?;

        match table.get(mail_id).map_err(io)? {
            Some(value) => Ok(Some(decode_mail(value.value())?)),
            None => Ok(None),
        }
    }

    fn list_mail(&self) -> Result<Vec<IndexedMail>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(MAIL).map_err(io)?;

        let mut mail = Vec::new();
        for result in table.iter().map_err(io)? {
            let (_, value) = result.map_err(io)?;
            mail.push(decode_mail(value.value())?);
        }

        Ok(mail)
    }

    fn sync_cursor(&self) -> Result<Option<u64>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(META).map_err(io)?;

        Ok(table.get(SYNC_CURSOR_KEY).map_err(io)?.map(|value| value.value()))
    }

    fn advance_sync_cursor(&self, block: u64) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(META).map_err(io)?;

            let current = table.get(SYNC_CURSOR_KEY).map_err(io)?.map(|value| value.value());
            if current.is_none_or(|current| block > current) {
                table.insert(SYNC_CURSOR_KEY, block).map_err(io)?;
            }
        }
        txn.commit().map_err(io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::{
        commitment::commit,
        ids::{IdentityId, TxHash},
        record::MailRecord,
    };

    fn mail(id: u64, handle: Option<&str>) -> IndexedMail {
        IndexedMail {
            record: MailRecord {
                id,
                commitment: commit(&format!("bafy{id}")),
                sender: IdentityId::from_email("a@x"),
                recipient: IdentityId::from_email("b@x"),
                timestamp: 1_700_000_000,
                verified: true,
            },
            handle: handle.map(str::to_string),
            block_number: 10 + id,
            tx_hash: Some(TxHash([id as u8; 32])),
        }
    }

    #[test]
    fn handles_roundtrip() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        storage.remember_handle(&commit("bafyA"), "bafyA").unwrap();
        assert_eq!(storage.lookup_handle(&commit("bafyA")).unwrap().as_deref(), Some("bafyA"));
        assert_eq!(storage.lookup_handle(&commit("bafyB")).unwrap(), None);
    }

    #[test]
    fn upsert_merges_and_reports() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        assert_eq!(storage.upsert_mail(&mail(1, None)).unwrap(), UpsertOutcome::Inserted);
        assert_eq!(storage.upsert_mail(&mail(1, None)).unwrap(), UpsertOutcome::Unchanged);
        assert_eq!(storage.upsert_mail(&mail(1, Some("bafy1"))).unwrap(), UpsertOutcome::Updated);
        assert_eq!(storage.load_mail(1).unwrap(), Some(mail(1, Some("bafy1"))));
    }

    #[test]
    fn list_is_ordered_by_id() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        for id in [300, 2, 70] {
            storage.upsert_mail(&mail(id, None)).unwrap();
        }

        let ids: Vec<u64> = storage.list_mail().unwrap().iter().map(IndexedMail::id).collect();
        assert_eq!(ids, vec![2, 70, 300]);
    }

    #[test]
    fn cursor_is_monotonic() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        assert_eq!(storage.sync_cursor().unwrap(), None);
        storage.advance_sync_cursor(0).unwrap();
        assert_eq!(storage.sync_cursor().unwrap(), Some(0));
        storage.advance_sync_cursor(9).unwrap();
        storage.advance_sync_cursor(3).unwrap();
        assert_eq!(storage.sync_cursor().unwrap(), Some(9));
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");

        {
            let storage = RedbStorage::open(&path).unwrap();
            storage.remember_handle(&commit("bafy1"), "bafy1").unwrap();
            storage.upsert_mail(&mail(1, Some("bafy1"))).unwrap();
            storage.advance_sync_cursor(42).unwrap();
        }

        let storage = RedbStorage::open(&path).unwrap();
        assert_eq!(storage.lookup_handle(&commit("bafy1")).unwrap().as_deref(), Some("bafy1"));
        assert_eq!(storage.load_mail(1).unwrap(), Some(mail(1, Some("bafy1"))));
        assert_eq!(storage.sync_cursor().unwrap(), Some(42));
    }
}
