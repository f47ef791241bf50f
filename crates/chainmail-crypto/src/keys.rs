//! secp256k1 key material for envelope recipients.

use std::fmt;

use k256::{PublicKey, SecretKey, elliptic_curve::sec1::ToEncodedPoint};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    encoding::{from_prefixed_hex, from_prefixed_hex_array, to_prefixed_hex},
    error::CryptoError,
};

/// Length of an uncompressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 65;

/// Length of a secp256k1 secret scalar.
pub const SECRET_KEY_LEN: usize = 32;

/// Consecutive degenerate scalar samples tolerated before the RNG is treated
/// as broken.
pub const MAX_KEYGEN_ATTEMPTS: u32 = 16;

/// Public half of a recipient keypair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientPublicKey(PublicKey);

impl RecipientPublicKey {
    /// Parse a compressed or uncompressed SEC1 encoding.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        PublicKey::from_sec1_bytes(bytes).map(Self).map_err(|_| CryptoError::InvalidPublicKey)
    }

    /// Parse a `0x`-prefixed hex SEC1 encoding.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        Self::from_sec1_bytes(&from_prefixed_hex(text)?)
    }

    /// Uncompressed SEC1 encoding (`0x04 || x || y`).
    pub fn to_uncompressed(&self) -> [u8; PUBLIC_KEY_LEN] {
        let point = self.0.to_encoded_point(false);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(point.as_bytes());
        bytes
    }

    /// `0x`-prefixed hex of the uncompressed encoding.
    pub fn to_hex(&self) -> String {
        to_prefixed_hex(&self.to_uncompressed())
    }

    pub(crate) fn as_point(&self) -> &PublicKey {
        &self.0
    }
}

/// Secret half of a recipient keypair.
///
/// The scalar is zeroized on drop and never printed.
#[derive(Clone)]
pub struct RecipientSecretKey(SecretKey);

impl RecipientSecretKey {
    /// Generate a fresh keypair from the given RNG.
    ///
    /// # Errors
    ///
    /// - `KeyGeneration`: the RNG produced only degenerate scalars
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Result<Self, CryptoError> {
        random_secret(rng).map(Self)
    }

    /// Load a 32-byte big-endian scalar.
    ///
    /// # Errors
    ///
    /// - `InvalidSecretKey`: zero or not below the group order
    pub fn from_bytes(bytes: &[u8; SECRET_KEY_LEN]) -> Result<Self, CryptoError> {
        SecretKey::from_slice(bytes).map(Self).map_err(|_| CryptoError::InvalidSecretKey)
    }

    /// Load a `0x`-prefixed hex scalar.
    pub fn from_hex(text: &str) -> Result<Self, CryptoError> {
        let bytes = Zeroizing::new(from_prefixed_hex_array::<SECRET_KEY_LEN>(text)?);
        Self::from_bytes(&bytes)
    }

    /// Big-endian scalar bytes.
    pub fn to_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_LEN]> {
        let mut bytes = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        bytes.copy_from_slice(&self.0.to_bytes());
        bytes
    }

    /// `0x`-prefixed hex of the scalar.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(to_prefixed_hex(&self.to_bytes()[..]))
    }

    /// Matching public key.
    pub fn public_key(&self) -> RecipientPublicKey {
        RecipientPublicKey(self.0.public_key())
    }

    pub(crate) fn as_scalar(&self) -> &SecretKey {
        &self.0
    }
}

impl fmt::Debug for RecipientSecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecipientSecretKey(..)")
    }
}

/// Sample a secret scalar, rejecting zero and out-of-range candidates.
///
/// A zero scalar would yield the point at infinity, so candidates are
/// resampled until one is valid.
pub(crate) fn random_secret<R: RngCore + CryptoRng>(rng: &mut R) -> Result<SecretKey, CryptoError> {
    for _ in 0..MAX_KEYGEN_ATTEMPTS {
        let mut candidate = Zeroizing::new([0u8; SECRET_KEY_LEN]);
        rng.fill_bytes(&mut candidate[..]);

        if let Ok(secret) = SecretKey::from_slice(&candidate[..]) {
            return Ok(secret);
        }
    }

    Err(CryptoError::KeyGeneration { attempts: MAX_KEYGEN_ATTEMPTS })
}
