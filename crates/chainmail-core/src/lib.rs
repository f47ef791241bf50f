//! Chainmail Protocol Core
//!
//! Sends encrypted mail whose only public trace is a commitment on an
//! append-only ledger, and rebuilds a local inbox from the ledger's events.
//!
//! # Architecture
//!
//! The core never performs I/O itself. Ledger, content store, prover and key
//! resolver are injected as [`Capabilities`]; time and randomness come from an
//! [`Environment`]; the local index lives behind the synchronous [`Storage`]
//! trait. The same flows run against production adapters and against the
//! deterministic simulation harness.
//!
//! ```text
//! send:    content → envelope → handle → commitment → ledger record → index
//! receive: ledger record → commitment → handle → envelope → content
//! ```
//!
//! # Components
//!
//! - [`Dispatcher`]: the outbound Resolve → … → Index flow
//! - [`Ingestor`]: catch-up replay plus live subscription into the index
//! - [`Mailbox`]: listing and decrypting indexed mail
//! - [`CommitmentMapper`]: handle ↔ commitment map with external fallback
//!
//! Logging goes through `tracing`; this crate never installs a subscriber.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod capabilities;
pub mod commitment;
pub mod config;
pub mod dispatch;
pub mod env;
pub mod error;
pub mod events;
pub mod ids;
pub mod ingest;
pub mod mailbox;
pub mod proof;
pub mod record;
pub mod storage;
mod system_env;

pub use capabilities::{
    Capabilities, ContentStore, HandleIndex, Ledger, MailSubmission, Prover, RecipientResolver,
    ResolvedRecipient, TxReceipt,
};
pub use commitment::{Commitment, CommitmentMapper, commit};
pub use config::{ChainmailConfig, DispatchConfig, IngestConfig, StorageConfig};
pub use dispatch::{DispatchReceipt, DispatchStep, Dispatcher};
pub use env::{EnvRng, Environment};
pub use error::{
    ConfigError, ContentStoreError, DecodeError, Error, LedgerError, ProverError, ResolverError,
};
pub use events::{DecodedLog, LogEntry, MAIL_SENT_SIGNATURE, MAIL_SENT_TOPIC, MailSentEvent};
pub use ids::{Address, IdentityId, TxHash, keccak256};
pub use ingest::{CatchUp, IngestEvent, Ingestor, Subscription};
pub use mailbox::Mailbox;
pub use proof::{PROOF_LEN, Proof, ProofRequest, PublicSignals};
pub use record::{Folder, IndexedMail, MailRecord, UpsertOutcome};
pub use storage::{ChaoticStorage, MemoryStorage, RedbStorage, Storage, StorageError};
pub use system_env::SystemEnv;
