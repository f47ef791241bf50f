//! Deterministic simulation harness for chainmail protocol testing.
//!
//! In-memory implementations of every collaborator trait plus a seeded
//! [`SimEnv`]. Nothing here touches the network or the system clock, so a
//! test that fixes its seed replays identically, envelopes included.
//!
//! # Fault Injection
//!
//! Each collaborator exposes switches a test flips to make the next call (or
//! every call) fail: ledger outages and submit faults, upload and pin
//! failures, slow uploads for timeout tests, prover failures and rejected
//! proofs, resolver outages. Faults are explicit, never random.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod sim_env;
pub mod sim_ledger;
pub mod sim_prover;
pub mod sim_store;
pub mod world;

pub use sim_env::{GENESIS_MILLIS, SimEnv};
pub use sim_ledger::{SimLedger, SubmitFault};
pub use sim_prover::{SimProver, SimResolver, sim_proof};
pub use sim_store::{SimContentStore, SimHandleIndex};
pub use world::{SimWorld, account_for};
