//! Error types for the chainmail protocol core.
//!
//! Strongly-typed errors per collaborator (ledger, content store, prover,
//! resolver, local storage) plus the top-level [`Error`] that the dispatch,
//! ingestion and mailbox flows return.
//!
//! Dispatch failures always name the step that failed via
//! [`Error::DispatchStepFailure`], so callers can tell whether anything
//! reached the ledger (nothing does before [`DispatchStep::Submit`]). A
//! failure after the ledger confirmed the mail carries the
//! [`DispatchReceipt`] and is never recoverable: retrying would record the
//! same message twice.

use std::time::Duration;

use chainmail_crypto::CryptoError;
use thiserror::Error;

use crate::{
    dispatch::{DispatchReceipt, DispatchStep},
    storage::StorageError,
};

/// Errors from the distributed ledger.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Node unreachable or request failed in transit
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// Transaction was rejected or reverted
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Confirmed transaction carried no `MailSent` event
    #[error("no MailSent event in transaction {tx_hash}")]
    MissingMailSent {
        /// Hash of the confirmed transaction
        tx_hash: String,
    },
}

impl LedgerError {
    /// Returns true if the same request may succeed on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors from content-addressed storage and the external handle index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContentStoreError {
    /// Backend unreachable or request failed in transit
    #[error("content store unavailable: {0}")]
    Unavailable(String),

    /// No object stored under this handle
    #[error("object not found: {0}")]
    NotFound(String),
}

/// Errors from the zero-knowledge proving system.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProverError {
    /// Witness generation or proving failed
    #[error("proof generation failed: {0}")]
    Generation(String),

    /// Proving backend unreachable
    #[error("prover unavailable: {0}")]
    Unavailable(String),
}

/// Errors from recipient public-key resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// No public key published for this recipient
    #[error("no public key for {email}")]
    UnknownRecipient {
        /// Recipient email
        email: String,
    },

    /// Published key is not a usable secp256k1 point
    #[error("invalid public key for {email}")]
    InvalidKey {
        /// Recipient email
        email: String,
    },

    /// Resolver backend unreachable
    #[error("resolver unavailable: {0}")]
    Unavailable(String),
}

/// Configuration rejected at load time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML did not parse or named unknown options
    #[error("TOML parse error: {0}")]
    Parse(String),

    /// A value is outside its allowed range
    #[error("invalid configuration: {field}: {reason}")]
    Invalid {
        /// Dotted option path
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Malformed bytes from an untrusted source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not `0x`-prefixed hex of the right length
    #[error("invalid hex: {0}")]
    Hex(String),

    /// Fixed-size encoding had the wrong length
    #[error("invalid {what} length: expected {expected} bytes, got {got}")]
    Length {
        /// What was being decoded
        what: &'static str,
        /// Required length
        expected: usize,
        /// Actual length
        got: usize,
    },

    /// Structurally valid bytes with an impossible value
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// What was being decoded
        what: &'static str,
        /// Why it was rejected
        reason: String,
    },
}

/// Top-level error for dispatch, ingestion and reading mail.
#[derive(Error, Debug)]
pub enum Error {
    /// Envelope or wrapped key failed authentication
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Envelope version not implemented
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u16),

    /// Recipient has no registered owner on the ledger
    #[error("recipient {email} is not registered")]
    RecipientUnregistered {
        /// Recipient email
        email: String,
    },

    /// No storage handle known for a commitment, locally or externally
    #[error("no handle for commitment {commitment}")]
    HandleNotFound {
        /// Commitment that could not be resolved
        commitment: String,
    },

    /// No indexed mail with this id
    #[error("unknown mail id {0}")]
    UnknownMail(u64),

    /// Locally generated proof did not verify
    #[error("proof failed local verification")]
    ProofInvalid,

    /// A dispatch step failed; nothing after it ran
    #[error("dispatch failed at {step}: {cause}")]
    DispatchStepFailure {
        /// Step that failed
        step: DispatchStep,
        /// Underlying error
        #[source]
        cause: Box<Error>,
        /// What the ledger already recorded, when the step ran after Submit
        receipt: Option<Box<DispatchReceipt>>,
    },

    /// A step exceeded its configured time bound
    #[error("{step} timed out after {after:?}")]
    StepTimeout {
        /// Step that timed out
        step: DispatchStep,
        /// Configured bound
        after: Duration,
    },

    /// Ledger failure
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// Content store failure
    #[error("content store error: {0}")]
    ContentStore(#[from] ContentStoreError),

    /// Prover failure
    #[error("prover error: {0}")]
    Prover(#[from] ProverError),

    /// Recipient resolver failure
    #[error("resolver error: {0}")]
    Resolver(#[from] ResolverError),

    /// Local storage failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Cryptographic failure other than integrity or version
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Invalid configuration
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed untrusted input
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The live ingestion task panicked
    #[error("ingestion task failed: {0}")]
    IngestTask(String),
}

impl Error {
    /// Returns true if retrying the whole operation may succeed.
    ///
    /// Network-facing collaborator failures and timeouts are recoverable. A
    /// retried dispatch produces a fresh envelope and handle. Integrity,
    /// registration and decoding failures are not: the same input fails the
    /// same way. Neither is any dispatch failure that carries a receipt, since
    /// the mail is already on the ledger.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::DispatchStepFailure { receipt: Some(_), .. } => false,
            Self::DispatchStepFailure { cause, .. } => cause.is_recoverable(),
            Self::StepTimeout { .. }
            | Self::ContentStore(_)
            | Self::Prover(_)
            | Self::ProofInvalid
            | Self::Storage(StorageError::Io(_)) => true,
            Self::Ledger(err) => err.is_transient(),
            Self::Resolver(err) => matches!(err, ResolverError::Unavailable(_)),
            _ => false,
        }
    }

    /// The innermost error, looking through step failures.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::DispatchStepFailure { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// What the ledger recorded before a dispatch failed, if it got that far.
    ///
    /// The mail is already delivered; ingestion indexes it from the ledger
    /// and the handle is resolvable from the local commitment map.
    pub fn dispatch_receipt(&self) -> Option<&DispatchReceipt> {
        match self {
            Self::DispatchStepFailure { receipt, .. } => receipt.as_deref(),
            _ => None,
        }
    }

    /// The step a dispatch failed at, if this is a dispatch failure.
    pub fn failed_step(&self) -> Option<DispatchStep> {
        match self {
            Self::DispatchStepFailure { step, .. } => Some(*step),
            _ => None,
        }
    }
}

impl From<CryptoError> for Error {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Integrity { reason } => Self::Integrity(reason.to_string()),
            CryptoError::UnsupportedVersion(version) => Self::UnsupportedVersion(version),
            other => Self::Crypto(other),
        }
    }
}
