//! Ledger logs and the `MailSent` event.
//!
//! ```text
//! event MailSent(
//!     uint256 indexed mailId,       // topics[1]
//!     bytes32 indexed recipientId,  // topics[2]
//!     bytes32 indexed senderId,     // topics[3]
//!     bytes32 commitment,           // data[0..32]
//!     uint256 timestamp             // data[32..64]
//! )
//! ```

use std::{fmt, sync::LazyLock};

use primitive_types::U256;

use crate::{
    commitment::Commitment,
    ids::{IdentityId, TxHash, keccak256},
    record::{IndexedMail, MailRecord},
};

/// Canonical `MailSent` signature.
pub const MAIL_SENT_SIGNATURE: &str = "MailSent(uint256,bytes32,bytes32,bytes32,uint256)";

/// `topics[0]` of every `MailSent` log.
pub static MAIL_SENT_TOPIC: LazyLock<[u8; 32]> =
    LazyLock::new(|| keccak256(MAIL_SENT_SIGNATURE.as_bytes()));

/// A raw log as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Block the log was emitted in
    pub block_number: u64,
    /// Emitting transaction, when known
    pub tx_hash: Option<TxHash>,
    /// Indexed topics, event signature first
    pub topics: Vec<[u8; 32]>,
    /// ABI-encoded non-indexed fields
    pub data: Vec<u8>,
}

impl LogEntry {
    /// Whether `topics[0]` is the `MailSent` signature.
    pub fn is_mail_sent(&self) -> bool {
        self.topics.first() == Some(&*MAIL_SENT_TOPIC)
    }
}

/// A fully decoded `MailSent` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSentEvent {
    /// Ledger-assigned mail id
    pub mail_id: u64,
    /// Recipient identity
    pub recipient: IdentityId,
    /// Sender identity
    pub sender: IdentityId,
    /// Commitment to the stored envelope
    pub commitment: Commitment,
    /// Ledger timestamp
    pub timestamp: u64,
    /// Block the event was emitted in
    pub block_number: u64,
    /// Emitting transaction, when known
    pub tx_hash: Option<TxHash>,
}

/// A `MailSent` log missing a required field.
///
/// Ingestion drops these with a warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMailSent {
    /// Block the log was emitted in
    pub block_number: u64,
    /// Emitting transaction, when known
    pub tx_hash: Option<TxHash>,
    /// Which field is missing or unusable
    pub missing: &'static str,
}

impl fmt::Display for PartialMailSent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MailSent at block {} without {}", self.block_number, self.missing)
    }
}

/// Result of decoding a log that carries the `MailSent` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedLog {
    /// Every field present and valid
    Complete(MailSentEvent),
    /// A required field is missing or out of range
    Partial(PartialMailSent),
}

fn word_to_u64(word: &[u8]) -> Option<u64> {
    let value = U256::from_big_endian(word);
    (value <= U256::from(u64::MAX)).then(|| value.low_u64())
}

impl MailSentEvent {
    /// Decode a ledger log.
    ///
    /// Returns `None` for logs of other events.
    pub fn decode(log: &LogEntry) -> Option<DecodedLog> {
        if !log.is_mail_sent() {
            return None;
        }

        let partial = |missing| {
            Some(DecodedLog::Partial(PartialMailSent {
                block_number: log.block_number,
                tx_hash: log.tx_hash,
                missing,
            }))
        };

        let Some(mail_id) = log.topics.get(1).and_then(|t| word_to_u64(&t[..])) else {
            return partial("mail id");
        };
        let Some(recipient) = log.topics.get(2) else {
            return partial("recipient id");
        };
        let Some(sender) = log.topics.get(3) else {
            return partial("sender id");
        };
        if log.data.len() < 64 {
            return partial("commitment");
        }

        let mut commitment = [0u8; 32];
        commitment.copy_from_slice(&log.data[..32]);
        let commitment = Commitment(commitment);
        if commitment.is_zero() {
            return partial("commitment");
        }

        let Some(timestamp) = word_to_u64(&log.data[32..64]) else {
            return partial("timestamp");
        };

        Some(DecodedLog::Complete(Self {
            mail_id,
            recipient: IdentityId(*recipient),
            sender: IdentityId(*sender),
            commitment,
            timestamp,
            block_number: log.block_number,
            tx_hash: log.tx_hash,
        }))
    }

    /// Encode as the log the ledger would emit.
    pub fn to_log(&self) -> LogEntry {
        let mut mail_id = [0u8; 32];
        mail_id[24..].copy_from_slice(&self.mail_id.to_be_bytes());

        let mut data = Vec::with_capacity(64);
        data.extend_from_slice(self.commitment.as_bytes());
        data.extend_from_slice(&[0u8; 24]);
        data.extend_from_slice(&self.timestamp.to_be_bytes());

        LogEntry {
            block_number: self.block_number,
            tx_hash: self.tx_hash,
            topics: vec![*MAIL_SENT_TOPIC, mail_id, self.recipient.0, self.sender.0],
            data,
        }
    }

    /// Index entry for this event, with the handle if already known.
    pub fn to_indexed(&self, handle: Option<String>) -> IndexedMail {
        IndexedMail {
            record: MailRecord {
                id: self.mail_id,
                commitment: self.commitment,
                sender: self.sender,
                recipient: self.recipient,
                timestamp: self.timestamp,
                verified: true,
            },
            handle,
            block_number: self.block_number,
            tx_hash: self.tx_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;

    fn event() -> MailSentEvent {
        MailSentEvent {
            mail_id: 7,
            recipient: IdentityId::from_email("b@x"),
            sender: IdentityId::from_email("a@x"),
            commitment: commit("bafyA"),
            timestamp: 1_700_000_000,
            block_number: 12,
            tx_hash: Some(TxHash([9; 32])),
        }
    }

    #[test]
    fn topic_is_keccak_of_signature() {
        assert_eq!(
            *MAIL_SENT_TOPIC,
            keccak256(b"MailSent(uint256,bytes32,bytes32,bytes32,uint256)")
        );
    }

    #[test]
    fn decodes_emitted_log() {
        let log = event().to_log();
        assert_eq!(log.topics.len(), 4);
        assert_eq!(log.data.len(), 64);
        assert_eq!(MailSentEvent::decode(&log), Some(DecodedLog::Complete(event())));
    }

    #[test]
    fn other_events_are_ignored() {
        let mut log = event().to_log();
        log.topics[0] = keccak256(b"Registered(bytes32,address)");
        assert_eq!(MailSentEvent::decode(&log), None);

        log.topics.clear();
        assert_eq!(MailSentEvent::decode(&log), None);
    }

    fn missing(log: &LogEntry) -> &'static str {
        match MailSentEvent::decode(log) {
            Some(DecodedLog::Partial(partial)) => partial.missing,
            _ => "<not partial>",
        }
    }

    #[test]
    fn missing_fields_yield_partial() {
        let full = event().to_log();

        let mut log = full.clone();
        log.topics.truncate(1);
        assert_eq!(missing(&log), "mail id");

        let mut log = full.clone();
        log.topics.truncate(3);
        assert_eq!(missing(&log), "sender id");

        let mut log = full.clone();
        log.data.truncate(40);
        assert_eq!(missing(&log), "commitment");

        let mut log = full;
        log.data[..32].fill(0);
        assert_eq!(missing(&log), "commitment");
    }

    #[test]
    fn oversized_mail_id_is_partial() {
        let mut log = event().to_log();
        log.topics[1][0] = 1;
        assert_eq!(missing(&log), "mail id");
    }

    #[test]
    fn indexed_entry_carries_event_fields() {
        let indexed = event().to_indexed(Some("bafyA".to_string()));
        assert_eq!(indexed.record.id, 7);
        assert_eq!(indexed.record.commitment, commit("bafyA"));
        assert_eq!(indexed.handle.as_deref(), Some("bafyA"));
        assert_eq!(indexed.block_number, 12);
        assert!(indexed.record.verified);
    }
}
