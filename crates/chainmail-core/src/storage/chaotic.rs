//! Seeded fault injection for the local index.
//!
//! Delegates to another [`Storage`] but fails a seeded fraction of operations
//! with [`StorageError::Io`]. Ingestion must stop at the first failed write
//! instead of skipping past it, so the sync cursor never jumps a gap.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use super::{Storage, StorageError};
use crate::{
    commitment::Commitment,
    record::{IndexedMail, UpsertOutcome},
};

/// [`Storage`] that fails a seeded fraction of calls.
///
/// Clones share the RNG and the rate, so the failure sequence depends only on
/// the seed, the order of operations and when the rate changed.
#[derive(Clone)]
pub struct ChaoticStorage<S: Storage> {
    inner: S,
    chaos: Arc<Mutex<Chaos>>,
    operation_count: Arc<AtomicUsize>,
}

struct Chaos {
    rng: ChaoticRng,
    /// Probability that a call fails
    failure_rate: f64,
}

/// Linear congruential generator, reproducible from its seed.
struct ChaoticRng {
    state: u64,
}

impl ChaoticRng {
    /// Next value in [0.0, 1.0)
    fn next(&mut self) -> f64 {
        // Numerical Recipes LCG
        const A: u64 = 1_664_525;
        const C: u64 = 1_013_904_223;
        const M: u64 = 1u64 << 32;

        self.state = (A.wrapping_mul(self.state).wrapping_add(C)) % M;
        (self.state as f64) / (M as f64)
    }
}

impl<S: Storage> ChaoticStorage<S> {
    /// Wrap `inner`, failing roughly `failure_rate` of operations.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        check_rate(failure_rate);

        Self {
            inner,
            chaos: Arc::new(Mutex::new(Chaos { rng: ChaoticRng { state: seed }, failure_rate })),
            operation_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change the failure rate for every clone from the next operation on.
    ///
    /// # Panics
    ///
    /// Panics if `failure_rate` is not in [0.0, 1.0]
    pub fn set_failure_rate(&self, failure_rate: f64) {
        check_rate(failure_rate);

        #[allow(clippy::expect_used)]
        let mut chaos = self.chaos.lock().expect("Chaos mutex poisoned");
        chaos.failure_rate = failure_rate;
    }

    /// Underlying storage (for checking invariants after chaos).
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Total number of storage operations attempted.
    pub fn operation_count(&self) -> usize {
        self.operation_count.load(Ordering::Relaxed)
    }

    /// Count the operation and decide whether it fails.
    fn roll(&self) -> Result<(), StorageError> {
        self.operation_count.fetch_add(1, Ordering::Relaxed);

        #[allow(clippy::expect_used)]
        let mut chaos = self.chaos.lock().expect("Chaos mutex poisoned");
        if chaos.rng.next() < chaos.failure_rate {
            return Err(StorageError::Io("chaotic failure injection".to_string()));
        }

        Ok(())
    }
}

fn check_rate(failure_rate: f64) {
    assert!(
        (0.0..=1.0).contains(&failure_rate),
        "failure_rate must be between 0.0 and 1.0, got {failure_rate}"
    );
}

impl<S: Storage> Storage for ChaoticStorage<S> {
    fn remember_handle(&self, commitment: &Commitment, handle: &str) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.remember_handle(commitment, handle)
    }

    fn lookup_handle(&self, commitment: &Commitment) -> Result<Option<String>, StorageError> {
        self.roll()?;
        self.inner.lookup_handle(commitment)
    }

    fn upsert_mail(&self, mail: &IndexedMail) -> Result<UpsertOutcome, StorageError> {
        self.roll()?;
        self.inner.upsert_mail(mail)
    }

    fn load_mail(&self, mail_id: u64) -> Result<Option<IndexedMail>, StorageError> {
        self.roll()?;
        self.inner.load_mail(mail_id)
    }

    fn list_mail(&self) -> Result<Vec<IndexedMail>, StorageError> {
        self.roll()?;
        self.inner.list_mail()
    }

    fn sync_cursor(&self) -> Result<Option<u64>, StorageError> {
        self.roll()?;
        self.inner.sync_cursor()
    }

    fn advance_sync_cursor(&self, block: u64) -> Result<(), StorageError> {
        self.roll()?;
        self.inner.advance_sync_cursor(block)
    }
}
