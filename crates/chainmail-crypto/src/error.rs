//! Error types for envelope encryption.
//!
//! Integrity failures are deliberately coarse: a MAC mismatch, a failed
//! authentication tag and a wrong-recipient attempt all surface as
//! [`CryptoError::Integrity`] so callers cannot use the error as an oracle.

use thiserror::Error;

/// Errors produced by the hybrid encryption engine and its wire format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Wrap MAC or payload authentication tag did not verify.
    ///
    /// Covers tampering and wrong-key attempts alike. No plaintext is ever
    /// returned alongside this error.
    #[error("integrity check failed: {reason}")]
    Integrity {
        /// Which check rejected the envelope
        reason: &'static str,
    },

    /// Envelope carries a version this engine does not implement.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u16),

    /// Envelope names an algorithm this engine does not implement.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Requested output length is outside what HKDF-SHA256 can expand to.
    #[error("key derivation failed: cannot derive {requested} bytes (allowed 1..={max})")]
    Derivation {
        /// Requested output length
        requested: usize,
        /// Largest supported output length
        max: usize,
    },

    /// Bytes do not encode a valid secp256k1 point.
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Bytes do not encode a valid secp256k1 scalar.
    #[error("invalid secret key")]
    InvalidSecretKey,

    /// The RNG kept producing degenerate scalars.
    #[error("ephemeral key generation failed after {attempts} attempts")]
    KeyGeneration {
        /// Number of samples rejected
        attempts: u32,
    },

    /// Plaintext exceeds what one AEAD call can seal.
    #[error("payload of {size} bytes is too large to seal")]
    PayloadTooLarge {
        /// Plaintext length in bytes
        size: usize,
    },

    /// A MAC key was rejected by the HMAC implementation.
    #[error("invalid MAC key length: {len}")]
    InvalidKeyLength {
        /// Offered key length in bytes
        len: usize,
    },

    /// Malformed hex or wrong fixed-size field length.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// JSON (de)serialization of the envelope or message content failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl CryptoError {
    /// Returns true if this error means the envelope failed authentication.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::Integrity { .. })
    }
}

impl From<serde_json::Error> for CryptoError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
