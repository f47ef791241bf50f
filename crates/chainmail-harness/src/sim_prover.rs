//! Simulated proving system and recipient key resolver.
//!
//! The simulated proof is a keccak chain over the public signals: it binds
//! exactly the signals it was made for, which is all the protocol observes.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory state only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use chainmail_core::{
    Address, Proof, ProofRequest, Prover, ProverError, PublicSignals, RecipientResolver,
    ResolvedRecipient, ResolverError, keccak256,
};
use chainmail_crypto::RecipientPublicKey;
use primitive_types::U256;

/// Proof the simulated prover emits for `signals`.
pub fn sim_proof(signals: &PublicSignals) -> Proof {
    let mut preimage = [0u8; 96];
    for (chunk, signal) in preimage.chunks_exact_mut(32).zip(signals.0.iter()) {
        signal.to_big_endian(chunk);
    }

    let mut words = [U256::zero(); 8];
    let mut digest = keccak256(&preimage);
    for word in &mut words {
        *word = U256::from_big_endian(&digest);
        digest = keccak256(&digest);
    }

    Proof {
        a: [words[0], words[1]],
        b: [[words[2], words[3]], [words[4], words[5]]],
        c: [words[6], words[7]],
    }
}

#[derive(Default)]
struct ProverState {
    fail_generation: bool,
    reject_all: bool,
    requests: Vec<ProofRequest>,
}

/// Deterministic prover.
#[derive(Clone, Default)]
pub struct SimProver {
    state: Arc<Mutex<ProverState>>,
}

impl SimProver {
    /// Prover that proves and verifies honestly.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, ProverState> {
        self.state.lock().expect("SimProver mutex poisoned")
    }

    /// Make `prove` fail until cleared.
    pub fn set_fail_generation(&self, fail: bool) {
        self.state().fail_generation = fail;
    }

    /// Make `verify` return false for every proof until cleared.
    pub fn set_reject_all(&self, reject: bool) {
        self.state().reject_all = reject;
    }

    /// Every request `prove` received.
    pub fn requests(&self) -> Vec<ProofRequest> {
        self.state().requests.clone()
    }
}

#[async_trait]
impl Prover for SimProver {
    async fn prove(&self, request: &ProofRequest) -> Result<Proof, ProverError> {
        let mut state = self.state();
        state.requests.push(request.clone());
        if state.fail_generation {
            return Err(ProverError::Generation("simulated witness failure".to_string()));
        }
        Ok(sim_proof(&request.public_signals))
    }

    async fn verify(&self, proof: &Proof, signals: &PublicSignals) -> Result<bool, ProverError> {
        if self.state().reject_all {
            return Ok(false);
        }
        Ok(*proof == sim_proof(signals))
    }
}

#[derive(Default)]
struct ResolverState {
    keys: HashMap<String, Vec<u8>>,
    unavailable: bool,
}

/// Recipient key directory.
#[derive(Clone, Default)]
pub struct SimResolver {
    state: Arc<Mutex<ResolverState>>,
}

impl SimResolver {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::expect_used)]
    fn state(&self) -> MutexGuard<'_, ResolverState> {
        self.state.lock().expect("SimResolver mutex poisoned")
    }

    /// Publish `key` for `email`.
    pub fn publish(&self, email: &str, key: &RecipientPublicKey) {
        self.publish_raw(email, key.to_uncompressed().to_vec());
    }

    /// Publish arbitrary key bytes for `email`.
    pub fn publish_raw(&self, email: &str, key: Vec<u8>) {
        self.state().keys.insert(normalize(email), key);
    }

    /// Make every lookup fail with `Unavailable` until cleared.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

#[async_trait]
impl RecipientResolver for SimResolver {
    async fn resolve(
        &self,
        email: &str,
        owner: &Address,
    ) -> Result<ResolvedRecipient, ResolverError> {
        let state = self.state();
        if state.unavailable {
            return Err(ResolverError::Unavailable("simulated outage".to_string()));
        }

        let public_key = state
            .keys
            .get(&normalize(email))
            .cloned()
            .ok_or_else(|| ResolverError::UnknownRecipient { email: email.to_string() })?;

        Ok(ResolvedRecipient { email: email.to_string(), owner: *owner, public_key })
    }
}
