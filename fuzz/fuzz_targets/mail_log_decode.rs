//! Fuzz target for MailSentEvent::decode
//!
//! Ledger logs are shaped by whoever emits them. Decoding must classify every
//! log as foreign, partial or complete without panicking.
//!
//! # Invariants
//!
//! - Logs without the MailSent topic decode to None
//! - Complete events carry a non-zero commitment and survive to_log/decode

#![no_main]

use arbitrary::Arbitrary;
use chainmail_core::{DecodedLog, LogEntry, MAIL_SENT_TOPIC, MailSentEvent, TxHash};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct FuzzLog {
    block_number: u64,
    tx_hash: Option<[u8; 32]>,
    /// Force topic0 to MailSent so most inputs reach field decoding
    mail_sent_topic: bool,
    topics: Vec<[u8; 32]>,
    data: Vec<u8>,
}

fuzz_target!(|input: FuzzLog| {
    let mut topics = input.topics;
    if input.mail_sent_topic {
        topics.insert(0, *MAIL_SENT_TOPIC);
    }
    let log = LogEntry {
        block_number: input.block_number,
        tx_hash: input.tx_hash.map(TxHash),
        topics,
        data: input.data,
    };

    match MailSentEvent::decode(&log) {
        None => assert!(!log.is_mail_sent()),
        Some(DecodedLog::Partial(_)) => {},
        Some(DecodedLog::Complete(event)) => {
            assert!(!event.commitment.is_zero());
            let again = MailSentEvent::decode(&event.to_log());
            assert_eq!(again, Some(DecodedLog::Complete(event)));
        },
    }
});
