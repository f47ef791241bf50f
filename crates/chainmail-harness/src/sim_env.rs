//! Simulated environment: seeded RNG and a manually advanced wall clock.

#![allow(clippy::disallowed_types, reason = "Locking simple RNG state")]

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chainmail_core::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Wall clock a fresh `SimEnv` starts at (2023-11-14T22:13:20Z).
pub const GENESIS_MILLIS: u64 = 1_700_000_000_000;

/// Deterministic environment for tests.
///
/// Clones share the RNG and the clock. The same seed and call order always
/// produce the same bytes, so envelopes sealed under a `SimEnv` are
/// reproducible.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha20Rng>>,
    clock_ms: Arc<AtomicU64>,
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Arc::new(Mutex::new(ChaCha20Rng::seed_from_u64(seed))),
            clock_ms: Arc::new(AtomicU64::new(GENESIS_MILLIS)),
        }
    }

    /// Move the wall clock forward.
    pub fn advance(&self, by: Duration) {
        let millis = u64::try_from(by.as_millis()).unwrap_or(u64::MAX);
        self.clock_ms.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    fn wall_clock_millis(&self) -> u64 {
        self.clock_ms.load(Ordering::SeqCst)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().expect("SimEnv RNG mutex poisoned").fill_bytes(buffer);
    }
}
