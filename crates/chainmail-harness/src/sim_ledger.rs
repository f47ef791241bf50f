//! Simulated ledger.
//!
//! Holds the owner registry, an ordered event log and live subscribers in one
//! mutex. Every accepted submission mines its own block and emits a
//! `MailSent` log. Faults are armed explicitly by the test.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory state only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chainmail_core::{
    Address, Commitment, IdentityId, Ledger, LedgerError, LogEntry, MailSentEvent, MailSubmission,
    TxHash, TxReceipt, keccak256,
};
use tokio::sync::mpsc;

/// Buffer of each subscriber channel.
const SUBSCRIBER_CAPACITY: usize = 1024;

/// Seconds between simulated blocks.
const BLOCK_INTERVAL_SECS: u64 = 12;

/// Timestamp of block zero, in seconds.
const GENESIS_SECS: u64 = 1_700_000_000;

/// How the next `submit` misbehaves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitFault {
    /// Fail with this error without mining anything
    Fail(LedgerError),
    /// Mine the transaction but emit no `MailSent` log
    OmitEvent,
    /// Emit two `MailSent` logs in the same receipt
    DuplicateEvent,
}

#[derive(Default)]
struct LedgerState {
    owners: HashMap<IdentityId, Address>,
    logs: Vec<LogEntry>,
    block: u64,
    next_mail_id: u64,
    submissions: Vec<MailSubmission>,
    subscribers: Vec<mpsc::Sender<LogEntry>>,
    submit_fault: Option<SubmitFault>,
    unavailable: bool,
}

impl LedgerState {
    fn mine(&mut self) -> u64 {
        self.block += 1;
        self.block
    }

    fn emit(&mut self, log: LogEntry) {
        self.subscribers.retain(|subscriber| match subscriber.try_send(log.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(block = log.block_number, "subscriber lagging, dropping it");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        self.logs.push(log);
    }

    fn mail_sent(
        &mut self,
        sender: IdentityId,
        recipient: IdentityId,
        commitment: Commitment,
        block_number: u64,
        tx_hash: TxHash,
    ) -> MailSentEvent {
        self.next_mail_id += 1;
        MailSentEvent {
            mail_id: self.next_mail_id,
            recipient,
            sender,
            commitment,
            timestamp: GENESIS_SECS + block_number * BLOCK_INTERVAL_SECS,
            block_number,
            tx_hash: Some(tx_hash),
        }
    }
}

fn tx_hash(block: u64, salt: u64) -> TxHash {
    let mut preimage = [0u8; 16];
    preimage[..8].copy_from_slice(&block.to_be_bytes());
    preimage[8..].copy_from_slice(&salt.to_be_bytes());
    TxHash(keccak256(&preimage))
}

/// In-memory ledger.
///
/// Clones share state.
#[derive(Clone, Default)]
pub struct SimLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl SimLedger {
    /// Empty ledger at block zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().expect("SimLedger mutex poisoned")
    }

    /// Register `email` as owned by `owner`.
    pub fn register(&self, email: &str, owner: Address) {
        self.state().owners.insert(IdentityId::from_email(email), owner);
    }

    /// Mine `count` empty blocks.
    pub fn mine_empty(&self, count: u64) {
        let mut state = self.state();
        for _ in 0..count {
            state.mine();
        }
    }

    /// Mine a block holding a `MailSent` for an out-of-band sender.
    pub fn mine_mail(
        &self,
        sender: &str,
        recipient: &str,
        commitment: Commitment,
    ) -> MailSentEvent {
        let mut state = self.state();
        let block = state.mine();
        let event = state.mail_sent(
            IdentityId::from_email(sender),
            IdentityId::from_email(recipient),
            commitment,
            block,
            tx_hash(block, 0),
        );
        state.emit(event.to_log());
        event
    }

    /// Mine a block holding an arbitrary log.
    pub fn mine_log(&self, mut log: LogEntry) -> u64 {
        let mut state = self.state();
        let block = state.mine();
        log.block_number = block;
        state.emit(log);
        block
    }

    /// Arm a fault for the next `submit` only.
    pub fn fail_next_submit(&self, fault: SubmitFault) {
        self.state().submit_fault = Some(fault);
    }

    /// Make every call fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// End every live subscription.
    pub fn close_subscriptions(&self) {
        self.state().subscribers.clear();
    }

    /// Every accepted submission, in order.
    pub fn submissions(&self) -> Vec<MailSubmission> {
        self.state().submissions.clone()
    }

    /// Every emitted log, in order.
    pub fn logs(&self) -> Vec<LogEntry> {
        self.state().logs.clone()
    }

    /// Latest block number.
    pub fn block(&self) -> u64 {
        self.state().block
    }

    fn check_available(&self) -> Result<(), LedgerError> {
        if self.state().unavailable {
            return Err(LedgerError::Unavailable("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl Ledger for SimLedger {
    async fn resolve_owner(&self, identity: &IdentityId) -> Result<Option<Address>, LedgerError> {
        self.check_available()?;
        Ok(self.state().owners.get(identity).copied())
    }

    async fn is_registered(&self, identity: &IdentityId) -> Result<bool, LedgerError> {
        self.check_available()?;
        Ok(self.state().owners.contains_key(identity))
    }

    async fn submit(&self, submission: &MailSubmission) -> Result<TxReceipt, LedgerError> {
        self.check_available()?;

        let mut state = self.state();
        let fault = state.submit_fault.take();
        if let Some(SubmitFault::Fail(err)) = fault {
            return Err(err);
        }

        let block = state.mine();
        let hash = tx_hash(block, state.submissions.len() as u64 + 1);
        state.submissions.push(submission.clone());

        let mut logs = Vec::new();
        if fault != Some(SubmitFault::OmitEvent) {
            let copies = if fault == Some(SubmitFault::DuplicateEvent) { 2 } else { 1 };
            for _ in 0..copies {
                let event = state.mail_sent(
                    submission.sender,
                    submission.recipient,
                    submission.commitment,
                    block,
                    hash,
                );
                let log = event.to_log();
                state.emit(log.clone());
                logs.push(log);
            }
        }

        Ok(TxReceipt { tx_hash: hash, block_number: block, logs })
    }

    async fn current_block(&self) -> Result<u64, LedgerError> {
        self.check_available()?;
        Ok(self.block())
    }

    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, LedgerError> {
        self.check_available()?;
        Ok(self
            .state()
            .logs
            .iter()
            .filter(|log| (from_block..=to_block).contains(&log.block_number))
            .cloned()
            .collect())
    }

    async fn subscribe(&self, from_block: u64) -> Result<mpsc::Receiver<LogEntry>, LedgerError> {
        self.check_available()?;

        let mut state = self.state();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        for log in state.logs.iter().filter(|log| log.block_number >= from_block) {
            tx.try_send(log.clone())
                .map_err(|_| LedgerError::Unavailable("replay exceeds buffer".to_string()))?;
        }
        state.subscribers.push(tx);

        Ok(rx)
    }
}
