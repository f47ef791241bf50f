//! Versioned envelope and its JSON wire format.
//!
//! Every byte field travels as `0x`-prefixed lowercase hex. Fixed-size fields
//! (nonce, tag, ephemeral key, wrapped key, MAC) are length-checked during
//! decoding, so a decoded [`Envelope`] always has well-formed shapes even
//! though its contents are still unauthenticated.
//!
//! Envelopes are produced and consumed only by [`crate::hybrid`]. Everything
//! else treats them as opaque bytes via [`Envelope::to_json_bytes`] and
//! [`Envelope::from_json_bytes`].

use serde::{Deserialize, Serialize};

use crate::{
    encoding::{hex_array, hex_vec},
    error::CryptoError,
    keys::PUBLIC_KEY_LEN,
};

/// Envelope format version produced by this engine.
pub const ENVELOPE_VERSION: u16 = 1;

/// Algorithm tag for the payload cipher.
pub const CONTENT_ALGORITHM: &str = "chacha20-poly1305";

/// Algorithm tag for the key wrap.
pub const KEY_ALGORITHM: &str = "secp256k1-ecdh-hkdf-sha256";

/// Content-type tag for canonical JSON message content.
pub const CONTENT_TYPE: &str = "application/json";

/// ChaCha20-Poly1305 nonce size (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag size.
pub const TAG_SIZE: usize = 16;

/// Symmetric payload key size (256 bits).
pub const SYMMETRIC_KEY_SIZE: usize = 32;

/// HMAC-SHA256 output size.
pub const MAC_SIZE: usize = 32;

/// The encrypted package: ciphertext, wrapped key and metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Envelope {
    /// Envelope format version
    pub version: u16,
    /// Symmetrically encrypted message content
    pub encrypted_content: EncryptedContent,
    /// Payload key wrapped for the recipient
    pub encrypted_key: EncryptedKey,
    /// Unauthenticated descriptive metadata
    pub metadata: EnvelopeMetadata,
}

/// AEAD output over the canonical message bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedContent {
    /// Cipher identifier
    pub algorithm: String,
    /// Ciphertext without the tag
    #[serde(with = "hex_vec")]
    pub ciphertext: Vec<u8>,
    /// 96-bit nonce
    #[serde(with = "hex_array")]
    pub nonce: [u8; NONCE_SIZE],
    /// Poly1305 authentication tag
    #[serde(with = "hex_array")]
    pub tag: [u8; TAG_SIZE],
}

/// Payload key wrapped under an ephemeral ECDH secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EncryptedKey {
    /// Key-wrap identifier
    pub algorithm: String,
    /// Uncompressed SEC1 ephemeral public key
    #[serde(with = "hex_array")]
    pub ephemeral_public_key: [u8; PUBLIC_KEY_LEN],
    /// Payload key XOR mask key
    #[serde(with = "hex_array")]
    pub ciphertext: [u8; SYMMETRIC_KEY_SIZE],
    /// HMAC-SHA256 over `ciphertext` under the MAC key
    #[serde(with = "hex_array")]
    pub mac: [u8; MAC_SIZE],
}

/// Descriptive metadata carried next to the ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvelopeMetadata {
    /// Protocol version
    pub version: u16,
    /// Message timestamp in unix milliseconds
    pub timestamp: u64,
    /// Length of the canonical plaintext in bytes
    pub size: u64,
    /// Plaintext content type
    pub content_type: String,
}

impl Envelope {
    /// Serialize to the JSON wire format.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse the JSON wire format.
    ///
    /// The version is read first, so an envelope from another format version
    /// is rejected as such whatever its remaining shape. Algorithms and
    /// integrity are checked by [`crate::decrypt`].
    ///
    /// # Errors
    ///
    /// - `UnsupportedVersion`: `version` is not [`ENVELOPE_VERSION`]
    /// - `Encoding`: not JSON, or not the version 1 shape
    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let header: VersionHeader =
            serde_json::from_slice(bytes).map_err(|e| CryptoError::Encoding(e.to_string()))?;
        if header.version != ENVELOPE_VERSION {
            return Err(CryptoError::UnsupportedVersion(header.version));
        }

        serde_json::from_slice(bytes).map_err(|e| CryptoError::Encoding(e.to_string()))
    }
}

/// The one field every envelope version shares.
#[derive(Deserialize)]
struct VersionHeader {
    version: u16,
}
