//! Ledger mail records and their local index entries.

use serde::{Deserialize, Serialize};

use crate::{
    commitment::Commitment,
    ids::{IdentityId, TxHash},
};

/// Ledger-visible mail tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MailRecord {
    /// Ledger-assigned id
    pub id: u64,
    /// Commitment to the stored envelope
    pub commitment: Commitment,
    /// Sender identity
    pub sender: IdentityId,
    /// Recipient identity
    pub recipient: IdentityId,
    /// Ledger timestamp
    pub timestamp: u64,
    /// Whether the ownership proof was verified on the ledger
    pub verified: bool,
}

/// Local materialized view of one mail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedMail {
    /// Ledger record
    pub record: MailRecord,
    /// Storage handle, `None` while unresolved
    pub handle: Option<String>,
    /// Block the record was emitted in
    pub block_number: u64,
    /// Emitting transaction, when known
    pub tx_hash: Option<TxHash>,
}

/// One side of an identity's mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Folder {
    /// Mail the identity received
    Inbox,
    /// Mail the identity sent
    Sent,
}

impl Folder {
    /// Whether `mail` belongs in this folder for `identity`.
    pub fn holds(self, mail: &IndexedMail, identity: &IdentityId) -> bool {
        match self {
            Self::Inbox => mail.record.recipient == *identity,
            Self::Sent => mail.record.sender == *identity,
        }
    }
}

/// What an upsert did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No entry existed for the id
    Inserted,
    /// Missing fields were filled in
    Updated,
    /// The entry already held everything offered
    Unchanged,
}

impl IndexedMail {
    /// Mail id.
    pub fn id(&self) -> u64 {
        self.record.id
    }

    /// Whether `identity` sent or received this mail.
    pub fn involves(&self, identity: &IdentityId) -> bool {
        self.record.sender == *identity || self.record.recipient == *identity
    }

    /// Fill fields this entry lacks from `other`.
    ///
    /// Never erases or overwrites a field that is already set, so applying
    /// the same update twice is the same as applying it once. Returns whether
    /// anything changed.
    pub fn merge(&mut self, other: &IndexedMail) -> bool {
        debug_assert_eq!(self.record.id, other.record.id);

        let mut changed = false;

        if self.handle.is_none() && other.handle.is_some() {
            self.handle.clone_from(&other.handle);
            changed = true;
        }
        if self.tx_hash.is_none() && other.tx_hash.is_some() {
            self.tx_hash = other.tx_hash;
            changed = true;
        }
        if self.block_number == 0 && other.block_number != 0 {
            self.block_number = other.block_number;
            changed = true;
        }
        if self.record.timestamp == 0 && other.record.timestamp != 0 {
            self.record.timestamp = other.record.timestamp;
            changed = true;
        }
        if !self.record.verified && other.record.verified {
            self.record.verified = true;
            changed = true;
        }

        changed
    }
}
