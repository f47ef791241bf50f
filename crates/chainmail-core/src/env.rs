//! Environment abstraction for deterministic testing.
//!
//! Decouples protocol logic from system resources (wall clock, randomness).
//! Production uses the OS clock and entropy; the simulation harness uses a
//! manually advanced clock and a seeded RNG so whole dispatch flows replay
//! byte-for-byte.

use rand::{CryptoRng, RngCore};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `random_bytes()` uses cryptographically secure entropy in production
/// - Methods are infallible except in exceptional circumstances (e.g., OS
///   entropy exhaustion, incorrect simulation setup)
pub trait Environment: Clone + Send + Sync + 'static {
    /// Milliseconds since the Unix epoch.
    ///
    /// Stamped into message content that carries no timestamp of its own.
    fn wall_clock_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    ///
    /// # Invariants
    ///
    /// - Given the same RNG seed, this produces the same sequence of bytes
    /// - Uses cryptographically secure RNG
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Adapts an [`Environment`] to the `rand` traits the encryption engine takes.
///
/// Only as strong as the environment's entropy. The [`Environment`] contract
/// requires a secure source, so `CryptoRng` holds for every implementation.
pub struct EnvRng<'a, E: Environment>(&'a E);

impl<'a, E: Environment> EnvRng<'a, E> {
    /// Borrow `env` as an RNG.
    pub fn new(env: &'a E) -> Self {
        Self(env)
    }
}

impl<E: Environment> RngCore for EnvRng<'_, E> {
    fn next_u32(&mut self) -> u32 {
        let mut bytes = [0u8; 4];
        self.0.random_bytes(&mut bytes);
        u32::from_be_bytes(bytes)
    }

    fn next_u64(&mut self) -> u64 {
        self.0.random_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.0.random_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.0.random_bytes(dest);
        Ok(())
    }
}

impl<E: Environment> CryptoRng for EnvRng<'_, E> {}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    };

    use super::*;

    /// Emits 0, 1, 2, ... so byte order is observable.
    #[derive(Clone, Default)]
    struct CountingEnv(Arc<AtomicU8>);

    impl Environment for CountingEnv {
        fn wall_clock_millis(&self) -> u64 {
            0
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for byte in buffer {
                *byte = self.0.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[test]
    fn rng_draws_from_environment() {
        let env = CountingEnv::default();
        let mut rng = EnvRng::new(&env);

        let mut buf = [0u8; 4];
        rng.fill_bytes(&mut buf);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(rng.next_u32(), u32::from_be_bytes([4, 5, 6, 7]));
        assert_eq!(env.random_u64(), u64::from_be_bytes([8, 9, 10, 11, 12, 13, 14, 15]));
    }
}
