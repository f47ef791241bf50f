//! Chainmail Envelope Cryptography
//!
//! Hybrid public-key encryption for mail addressed to a secp256k1 key. Pure
//! functions with deterministic outputs: callers provide the RNG and the
//! current time, so a seeded RNG reproduces an envelope byte for byte.
//!
//! # Envelope Lifecycle
//!
//! ```text
//! MessageContent
//!        │ canonicalize (pin timestamp, fixed field order)
//!        ▼
//! Canonical JSON bytes
//!        │ ChaCha20-Poly1305 under a fresh payload key
//!        ▼
//! Ciphertext + tag          payload key
//!                                │ ECDH(ephemeral, recipient) → HKDF → mask, mac key
//!                                ▼
//!                           wrapped key + HMAC
//!        │
//!        ▼
//! Envelope (JSON, 0x-hex byte fields)
//! ```
//!
//! # Security
//!
//! Confidentiality:
//! - Every envelope uses its own payload key, nonce and ephemeral keypair
//! - The ephemeral secret is zeroized as soon as the shared secret is derived
//!
//! Integrity:
//! - The Poly1305 tag authenticates the payload
//! - An HMAC authenticates the wrapped key and is verified in constant time
//!   before unwrapping
//! - Every failure of either check is reported as the same
//!   [`CryptoError::Integrity`] kind, with no partial plaintext
//!
//! Metadata is descriptive only and is not authenticated.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod content;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod hybrid;
pub mod kdf;
pub mod keys;

pub use content::{Attachment, MessageContent};
pub use encoding::{from_prefixed_hex, from_prefixed_hex_array, to_prefixed_hex};
pub use envelope::{
    CONTENT_ALGORITHM, CONTENT_TYPE, ENVELOPE_VERSION, EncryptedContent, EncryptedKey, Envelope,
    EnvelopeMetadata, KEY_ALGORITHM,
};
pub use error::CryptoError;
pub use hybrid::{SymmetricKey, decrypt, encrypt, unwrap_key, wrap_key};
pub use keys::{PUBLIC_KEY_LEN, RecipientPublicKey, RecipientSecretKey};
