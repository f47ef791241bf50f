//! External collaborators, injected as trait objects.
//!
//! The protocol never talks to a network directly. Each collaborator is an
//! object-safe async trait; production adapters and the simulation harness
//! implement the same traits and are handed over in one [`Capabilities`]
//! record at construction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    commitment::Commitment,
    error::{ContentStoreError, LedgerError, ProverError, ResolverError},
    events::LogEntry,
    ids::{Address, IdentityId, TxHash},
    proof::{Proof, ProofRequest, PublicSignals},
};

/// Arguments of the ledger's `sendMail` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSubmission {
    /// Ownership proof over the public signals
    pub proof: Proof,
    /// Public signals the proof was generated for
    pub public_signals: PublicSignals,
    /// Commitment to the stored envelope
    pub commitment: Commitment,
    /// Sender identity
    pub sender: IdentityId,
    /// Recipient identity
    pub recipient: IdentityId,
    /// Account submitting the transaction
    pub from: Address,
}

/// Confirmation of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    /// Transaction hash
    pub tx_hash: TxHash,
    /// Block the transaction was included in
    pub block_number: u64,
    /// Logs emitted by the transaction, in order
    pub logs: Vec<LogEntry>,
}

/// The append-only public ledger.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Account that owns `identity`, or `None` when unregistered.
    async fn resolve_owner(&self, identity: &IdentityId) -> Result<Option<Address>, LedgerError>;

    /// Whether `identity` has been registered.
    async fn is_registered(&self, identity: &IdentityId) -> Result<bool, LedgerError>;

    /// Submit a mail and wait for the confirmation receipt.
    ///
    /// The assigned mail id is only available from the receipt logs.
    async fn submit(&self, submission: &MailSubmission) -> Result<TxReceipt, LedgerError>;

    /// Latest block number.
    async fn current_block(&self) -> Result<u64, LedgerError>;

    /// Logs emitted in `[from_block, to_block]` (inclusive), in block order.
    async fn logs_in_range(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<LogEntry>, LedgerError>;

    /// Live logs from `from_block` (inclusive) onward.
    ///
    /// Logs already emitted at or after `from_block` are delivered first, so
    /// a subscriber never misses the boundary block. The stream ends when
    /// the ledger connection closes.
    async fn subscribe(&self, from_block: u64) -> Result<mpsc::Receiver<LogEntry>, LedgerError>;
}

/// Content-addressed storage for envelopes.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes, returning their handle.
    async fn put(&self, bytes: Vec<u8>) -> Result<String, ContentStoreError>;

    /// Fetch the bytes stored under `handle`.
    async fn get(&self, handle: &str) -> Result<Vec<u8>, ContentStoreError>;

    /// Ask the backend to retain `handle`.
    async fn pin(&self, handle: &str) -> Result<(), ContentStoreError>;
}

/// The zero-knowledge proving system.
///
/// Circuit and proving key are adapter configuration.
#[async_trait]
pub trait Prover: Send + Sync {
    /// Generate an ownership proof.
    async fn prove(&self, request: &ProofRequest) -> Result<Proof, ProverError>;

    /// Check a proof against its public signals.
    async fn verify(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool, ProverError>;
}

/// A recipient's published encryption key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRecipient {
    /// Recipient email
    pub email: String,
    /// Ledger account owning the identity
    pub owner: Address,
    /// SEC1-encoded secp256k1 public key
    pub public_key: Vec<u8>,
}

/// Lookup of recipient encryption keys.
#[async_trait]
pub trait RecipientResolver: Send + Sync {
    /// Public key for `email`, owned by `owner`.
    async fn resolve(
        &self,
        email: &str,
        owner: &Address,
    ) -> Result<ResolvedRecipient, ResolverError>;
}

/// External commitment-to-handle index, consulted on a local miss.
#[async_trait]
pub trait HandleIndex: Send + Sync {
    /// Handle recorded for `commitment`, if any.
    async fn lookup(&self, commitment: &Commitment) -> Result<Option<String>, ContentStoreError>;
}

/// Every collaborator the protocol needs.
#[derive(Clone)]
pub struct Capabilities {
    /// Ledger node
    pub ledger: Arc<dyn Ledger>,
    /// Envelope storage
    pub content_store: Arc<dyn ContentStore>,
    /// Proving system
    pub prover: Arc<dyn Prover>,
    /// Recipient key lookup
    pub resolver: Arc<dyn RecipientResolver>,
    /// Fallback handle index
    pub handle_index: Option<Arc<dyn HandleIndex>>,
}
