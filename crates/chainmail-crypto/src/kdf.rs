//! Purpose-separated key derivation using HKDF
//!
//! One ECDH shared secret is expanded into independent sub-keys by varying
//! the HKDF `info` label. The wrap step needs two of them: a mask key that
//! hides the payload key and a MAC key that authenticates the masked result.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// Label for the key that masks the symmetric payload key.
pub const WRAP_MASK_LABEL: &[u8] = b"chainmail/v1/wrap-mask";

/// Label for the key that authenticates the wrapped payload key.
pub const WRAP_MAC_LABEL: &[u8] = b"chainmail/v1/wrap-mac";

/// Largest output HKDF-SHA256 can expand to (255 blocks of 32 bytes).
pub const MAX_DERIVED_LEN: usize = 255 * 32;

/// Derive `len` bytes bound to `label` from a shared secret.
///
/// # Security
///
/// - Deterministic: same `(shared_secret, label)` always yields the same bytes
/// - Different labels yield independent outputs from the same secret
/// - Output is zeroized when dropped
///
/// # Errors
///
/// - `Derivation`: `len` is zero or exceeds [`MAX_DERIVED_LEN`]
pub fn derive(
    shared_secret: &[u8],
    label: &[u8],
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if len == 0 || len > MAX_DERIVED_LEN {
        return Err(CryptoError::Derivation { requested: len, max: MAX_DERIVED_LEN });
    }

    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut okm = Zeroizing::new(vec![0u8; len]);
    hkdf.expand(label, &mut okm[..])
        .map_err(|_| CryptoError::Derivation { requested: len, max: MAX_DERIVED_LEN })?;

    Ok(okm)
}

/// Derive a 32-byte key bound to `label`.
fn derive_key(shared_secret: &[u8], label: &[u8]) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let okm = derive(shared_secret, label, 32)?;
    let mut key = Zeroizing::new([0u8; 32]);
    key.copy_from_slice(&okm);
    Ok(key)
}

/// The pair of sub-keys used to wrap one payload key.
///
/// Both keys live only for the duration of a single wrap or unwrap call and
/// are zeroized on drop.
pub struct WrapKeys {
    mask: Zeroizing<[u8; 32]>,
    mac: Zeroizing<[u8; 32]>,
}

impl WrapKeys {
    /// Split an ECDH shared secret into mask and MAC keys.
    pub fn derive(shared_secret: &[u8]) -> Result<Self, CryptoError> {
        Ok(Self {
            mask: derive_key(shared_secret, WRAP_MASK_LABEL)?,
            mac: derive_key(shared_secret, WRAP_MAC_LABEL)?,
        })
    }

    /// Keystream that is XORed with the payload key.
    pub fn mask(&self) -> &[u8; 32] {
        &self.mask
    }

    /// HMAC-SHA256 key for the wrapped payload key.
    pub fn mac(&self) -> &[u8; 32] {
        &self.mac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"shared_secret_material_for_test!";

    #[test]
    fn derive_is_deterministic() {
        let a = derive(SECRET, b"label", 32).unwrap();
        let b = derive(SECRET, b"label", 32).unwrap();
        assert_eq!(*a, *b, "same inputs must produce same output");
    }

    #[test]
    fn different_labels_produce_different_outputs() {
        let mask = derive(SECRET, WRAP_MASK_LABEL, 32).unwrap();
        let mac = derive(SECRET, WRAP_MAC_LABEL, 32).unwrap();
        assert_ne!(*mask, *mac);
    }

    #[test]
    fn different_secrets_produce_different_outputs() {
        let a = derive(b"secret_a", WRAP_MASK_LABEL, 32).unwrap();
        let b = derive(b"secret_b", WRAP_MASK_LABEL, 32).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn requested_length_is_honored() {
        for len in [1, 16, 32, 33, 64, 1000, MAX_DERIVED_LEN] {
            assert_eq!(derive(SECRET, b"len", len).unwrap().len(), len);
        }
    }

    #[test]
    fn shorter_output_is_prefix_of_longer() {
        let short = derive(SECRET, b"prefix", 16).unwrap();
        let long = derive(SECRET, b"prefix", 64).unwrap();
        assert_eq!(&long[..16], &short[..]);
    }

    #[test]
    fn length_above_bound_is_rejected() {
        let result = derive(SECRET, b"too-long", MAX_DERIVED_LEN + 1);
        assert_eq!(
            result.map(|_| ()),
            Err(CryptoError::Derivation { requested: MAX_DERIVED_LEN + 1, max: MAX_DERIVED_LEN })
        );
    }

    #[test]
    fn zero_length_is_rejected() {
        assert!(matches!(derive(SECRET, b"empty", 0), Err(CryptoError::Derivation { .. })));
    }

    #[test]
    fn wrap_keys_match_generic_derivation() {
        let keys = WrapKeys::derive(SECRET).unwrap();
        assert_eq!(&keys.mask()[..], &derive(SECRET, WRAP_MASK_LABEL, 32).unwrap()[..]);
        assert_eq!(&keys.mac()[..], &derive(SECRET, WRAP_MAC_LABEL, 32).unwrap()[..]);
        assert_ne!(keys.mask(), keys.mac(), "mask and mac keys must be independent");
    }

    #[test]
    fn works_with_empty_secret() {
        let keys = WrapKeys::derive(&[]).unwrap();
        assert_eq!(keys.mask().len(), 32);
    }
}
