//! Wall clock and OS entropy for real deployments.
//!
//! Behavior is non-deterministic by nature: real wall-clock time and OS
//! entropy. Tests use the harness `SimEnv` instead.

use crate::env::Environment;

/// [`Environment`] backed by `SystemTime` and `getrandom`.
///
/// Randomness comes straight from the OS CSPRNG, so it is fit for payload
/// keys, nonces and ephemeral scalars.
///
/// # Panics
///
/// Panics if the OS RNG fails. Without functioning cryptographic randomness
/// no envelope can be sealed safely.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// The system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    #[allow(clippy::disallowed_methods)]
    #[allow(clippy::expect_used)]
    fn wall_clock_millis(&self) -> u64 {
        let elapsed = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)");
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - cannot seal envelopes securely");
    }
}
