//! Hybrid encryption: `ChaCha20-Poly1305` payload, secp256k1 ECDH key wrap
//!
//! All functions are pure - randomness and the current time are provided by
//! the caller. Under a seeded RNG the same inputs always yield the same
//! envelope, which keeps simulation tests reproducible.
//!
//! # Wrap construction
//!
//! ```text
//! shared   = ECDH(ephemeral_secret, recipient_public)
//! mask     = HKDF(shared, "chainmail/v1/wrap-mask")
//! mac_key  = HKDF(shared, "chainmail/v1/wrap-mac")
//! wrapped  = sym_key XOR mask
//! mac      = HMAC-SHA256(mac_key, wrapped)
//! ```
//!
//! The MAC is checked in constant time before the mask is ever applied on the
//! way back, so a forged wrapped key never reaches the AEAD.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use hmac::{Hmac, Mac};
use k256::{ecdh::diffie_hellman, elliptic_curve::sec1::ToEncodedPoint};
use rand::{CryptoRng, RngCore};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::{
    content::MessageContent,
    envelope::{
        CONTENT_ALGORITHM, CONTENT_TYPE, ENVELOPE_VERSION, EncryptedContent, EncryptedKey,
        Envelope, EnvelopeMetadata, KEY_ALGORITHM, MAC_SIZE, NONCE_SIZE, SYMMETRIC_KEY_SIZE,
        TAG_SIZE,
    },
    error::CryptoError,
    kdf::WrapKeys,
    keys::{PUBLIC_KEY_LEN, RecipientPublicKey, RecipientSecretKey, random_secret},
};

type HmacSha256 = Hmac<Sha256>;

/// Symmetric payload key, zeroized on drop.
pub type SymmetricKey = Zeroizing<[u8; SYMMETRIC_KEY_SIZE]>;

/// Encrypt `content` for the holder of `recipient`.
///
/// A missing timestamp is pinned to `now_ms` before serialization, and the
/// envelope metadata records that pinned value.
///
/// # Security
///
/// - Fresh payload key, nonce and ephemeral keypair per call
/// - Ephemeral secret and payload key are zeroized before returning
/// - Caller MUST provide a cryptographically secure RNG in production
///
/// # Errors
///
/// - `KeyGeneration`: the RNG produced only degenerate ephemeral scalars
/// - `Serialization`: the content could not be encoded
pub fn encrypt<R: RngCore + CryptoRng>(
    content: &MessageContent,
    recipient: &RecipientPublicKey,
    now_ms: u64,
    rng: &mut R,
) -> Result<Envelope, CryptoError> {
    let canonical = content.canonicalize(now_ms);
    let plaintext = Zeroizing::new(canonical.to_canonical_bytes()?);

    let mut sym_key: SymmetricKey = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    rng.fill_bytes(&mut sym_key[..]);
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);

    let encrypted_content = seal_payload(&plaintext, &sym_key, nonce)?;
    let encrypted_key = wrap_key(&sym_key, recipient, rng)?;

    Ok(Envelope {
        version: ENVELOPE_VERSION,
        encrypted_content,
        encrypted_key,
        metadata: EnvelopeMetadata {
            version: ENVELOPE_VERSION,
            timestamp: canonical.timestamp().unwrap_or(now_ms),
            size: plaintext.len() as u64,
            content_type: CONTENT_TYPE.to_string(),
        },
    })
}

/// Decrypt an envelope with the recipient's secret key.
///
/// Version and algorithm tags are checked before any cryptographic work.
/// Either the full message is returned or nothing is.
///
/// # Errors
///
/// - `UnsupportedVersion`: envelope version is not 1
/// - `UnsupportedAlgorithm`: unknown payload or key-wrap algorithm
/// - `InvalidPublicKey`: ephemeral key is not a valid curve point
/// - `Integrity`: wrong recipient, tampered key wrap or tampered payload
/// - `Serialization`: authenticated plaintext is not valid message content
pub fn decrypt(
    envelope: &Envelope,
    recipient: &RecipientSecretKey,
) -> Result<MessageContent, CryptoError> {
    if envelope.version != ENVELOPE_VERSION {
        return Err(CryptoError::UnsupportedVersion(envelope.version));
    }
    if envelope.encrypted_content.algorithm != CONTENT_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(
            envelope.encrypted_content.algorithm.clone(),
        ));
    }

    let sym_key = unwrap_key(&envelope.encrypted_key, recipient)?;
    let plaintext = open_payload(&envelope.encrypted_content, &sym_key)?;

    MessageContent::from_canonical_bytes(&plaintext)
}

/// Wrap a payload key for `recipient` under a fresh ephemeral keypair.
///
/// Two calls with the same key produce unrelated outputs because each draws
/// its own ephemeral scalar.
///
/// # Errors
///
/// - `KeyGeneration`: the RNG produced only degenerate ephemeral scalars
pub fn wrap_key<R: RngCore + CryptoRng>(
    sym_key: &[u8; SYMMETRIC_KEY_SIZE],
    recipient: &RecipientPublicKey,
    rng: &mut R,
) -> Result<EncryptedKey, CryptoError> {
    let ephemeral = random_secret(rng)?;
    let shared = diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_point().as_affine());
    let wrap_keys = WrapKeys::derive(shared.raw_secret_bytes())?;

    let mut ephemeral_public_key = [0u8; PUBLIC_KEY_LEN];
    ephemeral_public_key.copy_from_slice(ephemeral.public_key().to_encoded_point(false).as_bytes());
    drop(ephemeral);

    let mut ciphertext = [0u8; SYMMETRIC_KEY_SIZE];
    xor_keystream(sym_key, wrap_keys.mask(), &mut ciphertext);
    let mac = compute_mac(wrap_keys.mac(), &ciphertext)?;

    Ok(EncryptedKey { algorithm: KEY_ALGORITHM.to_string(), ephemeral_public_key, ciphertext, mac })
}

/// Recover a payload key wrapped by [`wrap_key`].
///
/// # Errors
///
/// - `UnsupportedAlgorithm`: unknown key-wrap algorithm
/// - `InvalidPublicKey`: ephemeral key is not a valid curve point
/// - `Integrity`: MAC mismatch (wrong recipient or tampered wrap)
pub fn unwrap_key(
    encrypted_key: &EncryptedKey,
    recipient: &RecipientSecretKey,
) -> Result<SymmetricKey, CryptoError> {
    if encrypted_key.algorithm != KEY_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(encrypted_key.algorithm.clone()));
    }

    let ephemeral = RecipientPublicKey::from_sec1_bytes(&encrypted_key.ephemeral_public_key)?;
    let shared = diffie_hellman(
        recipient.as_scalar().to_nonzero_scalar(),
        ephemeral.as_point().as_affine(),
    );
    let wrap_keys = WrapKeys::derive(shared.raw_secret_bytes())?;

    verify_mac(wrap_keys.mac(), &encrypted_key.ciphertext, &encrypted_key.mac)?;

    let mut sym_key: SymmetricKey = Zeroizing::new([0u8; SYMMETRIC_KEY_SIZE]);
    xor_keystream(&encrypted_key.ciphertext, wrap_keys.mask(), &mut sym_key[..]);
    Ok(sym_key)
}

fn seal_payload(
    plaintext: &[u8],
    sym_key: &[u8; SYMMETRIC_KEY_SIZE],
    nonce: [u8; NONCE_SIZE],
) -> Result<EncryptedContent, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(sym_key));
    let mut ciphertext = plaintext.to_vec();

    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut ciphertext)
        .map_err(|_| CryptoError::PayloadTooLarge { size: plaintext.len() })?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(&tag);

    Ok(EncryptedContent {
        algorithm: CONTENT_ALGORITHM.to_string(),
        ciphertext,
        nonce,
        tag: tag_bytes,
    })
}

fn open_payload(
    encrypted: &EncryptedContent,
    sym_key: &[u8; SYMMETRIC_KEY_SIZE],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(sym_key));
    let mut buffer = Zeroizing::new(encrypted.ciphertext.clone());

    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&encrypted.nonce),
            b"",
            &mut *buffer,
            Tag::from_slice(&encrypted.tag),
        )
        .map_err(|_| CryptoError::Integrity { reason: "payload authentication tag mismatch" })?;

    Ok(buffer)
}

/// XOR `input` with `mask`, cycling the mask to the input length.
fn xor_keystream(input: &[u8], mask: &[u8], output: &mut [u8]) {
    for ((out, byte), m) in output.iter_mut().zip(input).zip(mask.iter().cycle()) {
        *out = byte ^ m;
    }
}

fn new_mac(mac_key: &[u8; 32]) -> Result<HmacSha256, CryptoError> {
    <HmacSha256 as Mac>::new_from_slice(mac_key)
        .map_err(|_| CryptoError::InvalidKeyLength { len: mac_key.len() })
}

fn compute_mac(mac_key: &[u8; 32], wrapped: &[u8]) -> Result<[u8; MAC_SIZE], CryptoError> {
    let mut mac = new_mac(mac_key)?;
    mac.update(wrapped);

    let mut out = [0u8; MAC_SIZE];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn verify_mac(mac_key: &[u8; 32], wrapped: &[u8], expected: &[u8]) -> Result<(), CryptoError> {
    let mut mac = new_mac(mac_key)?;
    mac.update(wrapped);
    mac.verify_slice(expected)
        .map_err(|_| CryptoError::Integrity { reason: "key wrap MAC mismatch" })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::content::Attachment;

    const NOW: u64 = 1_700_000_000_000;

    fn test_keypair() -> (RecipientSecretKey, RecipientPublicKey) {
        let secret = RecipientSecretKey::from_bytes(&[0x11; 32]).unwrap();
        let public = secret.public_key();
        (secret, public)
    }

    fn scenario_content() -> MessageContent {
        MessageContent::new("a@x", "b@x", "hi", "hello")
    }

    fn sealed() -> (Envelope, RecipientSecretKey) {
        let (secret, public) = test_keypair();
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        (encrypt(&scenario_content(), &public, NOW, &mut rng).unwrap(), secret)
    }

    fn assert_integrity(result: Result<MessageContent, CryptoError>) {
        assert!(
            matches!(result, Err(CryptoError::Integrity { .. })),
            "expected integrity failure, got {result:?}"
        );
    }

    #[test]
    fn scenario_roundtrip_with_fixed_keypair() {
        let (envelope, secret) = sealed();
        let decrypted = decrypt(&envelope, &secret).unwrap();

        assert_eq!(decrypted, scenario_content().with_timestamp(NOW));
        assert_eq!(decrypted.subject(), "hi");
        assert_eq!(decrypted.body(), "hello");
    }

    #[test]
    fn metadata_describes_canonical_plaintext() {
        let (envelope, _) = sealed();
        let expected_len = scenario_content().canonicalize(NOW).to_canonical_bytes().unwrap().len();

        assert_eq!(envelope.version, ENVELOPE_VERSION);
        assert_eq!(envelope.metadata.timestamp, NOW);
        assert_eq!(envelope.metadata.size, expected_len as u64);
        assert_eq!(envelope.metadata.content_type, CONTENT_TYPE);
        assert_eq!(envelope.encrypted_content.ciphertext.len(), expected_len);
    }

    #[test]
    fn pinned_timestamp_is_preserved() {
        let (secret, public) = test_keypair();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let content = scenario_content().with_timestamp(5);

        let envelope = encrypt(&content, &public, NOW, &mut rng).unwrap();
        assert_eq!(envelope.metadata.timestamp, 5);
        assert_eq!(decrypt(&envelope, &secret).unwrap().timestamp(), Some(5));
    }

    #[test]
    fn attachments_survive_roundtrip() {
        let (secret, public) = test_keypair();
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let content = scenario_content().with_attachments(vec![Attachment {
            name: "report.pdf".to_string(),
            mime_type: "application/pdf".to_string(),
            size: 1024,
            handle: Some("bafyreport".to_string()),
        }]);

        let envelope = encrypt(&content, &public, NOW, &mut rng).unwrap();
        assert_eq!(decrypt(&envelope, &secret).unwrap().attachments(), content.attachments());
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let (_, public) = test_keypair();
        let a = encrypt(&scenario_content(), &public, NOW, &mut ChaCha20Rng::seed_from_u64(9));
        let b = encrypt(&scenario_content(), &public, NOW, &mut ChaCha20Rng::seed_from_u64(9));
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn identical_content_encrypts_freshly() {
        let (_, public) = test_keypair();
        let mut rng = ChaCha20Rng::seed_from_u64(3);

        let first = encrypt(&scenario_content(), &public, NOW, &mut rng).unwrap();
        let second = encrypt(&scenario_content(), &public, NOW, &mut rng).unwrap();

        assert_ne!(
            first.encrypted_key.ephemeral_public_key,
            second.encrypted_key.ephemeral_public_key
        );
        assert_ne!(first.encrypted_content.ciphertext, second.encrypted_content.ciphertext);
    }

    #[test]
    fn rewrapping_same_key_changes_wrapped_ciphertext() {
        let (secret, public) = test_keypair();
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let sym_key = [0x5A; SYMMETRIC_KEY_SIZE];

        let first = wrap_key(&sym_key, &public, &mut rng).unwrap();
        let second = wrap_key(&sym_key, &public, &mut rng).unwrap();

        assert_ne!(first.ciphertext, second.ciphertext);
        assert_eq!(*unwrap_key(&first, &secret).unwrap(), sym_key);
        assert_eq!(*unwrap_key(&second, &secret).unwrap(), sym_key);
    }

    #[test]
    fn wrong_recipient_fails_integrity() {
        let (envelope, _) = sealed();
        let other = RecipientSecretKey::from_bytes(&[0x22; 32]).unwrap();
        assert_integrity(decrypt(&envelope, &other));
    }

    #[test]
    fn unknown_version_is_rejected_before_crypto() {
        let (mut envelope, secret) = sealed();
        envelope.version = 2;
        assert_eq!(decrypt(&envelope, &secret), Err(CryptoError::UnsupportedVersion(2)));
    }

    #[test]
    fn unknown_algorithms_are_rejected() {
        let (envelope, secret) = sealed();

        let mut content_alg = envelope.clone();
        content_alg.encrypted_content.algorithm = "aes-256-gcm".to_string();
        assert_eq!(
            decrypt(&content_alg, &secret),
            Err(CryptoError::UnsupportedAlgorithm("aes-256-gcm".to_string()))
        );

        let mut key_alg = envelope;
        key_alg.encrypted_key.algorithm = "rsa-oaep".to_string();
        assert_eq!(
            decrypt(&key_alg, &secret),
            Err(CryptoError::UnsupportedAlgorithm("rsa-oaep".to_string()))
        );
    }

    #[test]
    fn off_curve_ephemeral_key_is_reported() {
        let (mut envelope, secret) = sealed();
        envelope.encrypted_key.ephemeral_public_key = [0x04; PUBLIC_KEY_LEN];
        assert_eq!(decrypt(&envelope, &secret), Err(CryptoError::InvalidPublicKey));
    }

    #[test]
    fn tampered_wrapped_key_fails_mac_before_aead() {
        let (mut envelope, secret) = sealed();
        envelope.encrypted_key.ciphertext[0] ^= 0x01;
        assert_eq!(
            decrypt(&envelope, &secret),
            Err(CryptoError::Integrity { reason: "key wrap MAC mismatch" })
        );
    }

    #[test]
    fn envelope_survives_wire_encoding() {
        let (envelope, secret) = sealed();
        let decoded = Envelope::from_json_bytes(&envelope.to_json_bytes().unwrap()).unwrap();
        assert_eq!(decrypt(&decoded, &secret).unwrap(), scenario_content().with_timestamp(NOW));
    }

    #[test]
    fn xor_keystream_cycles_short_mask() {
        let mut out = [0u8; 4];
        xor_keystream(&[1, 2, 3, 4], &[0xFF, 0x00], &mut out);
        assert_eq!(out, [0xFE, 0x02, 0xFC, 0x04]);
    }

    /// Field of the envelope that a tamper case flips a bit in.
    #[derive(Debug, Clone, Copy)]
    enum Field {
        Ciphertext,
        Nonce,
        Tag,
        WrappedKey,
        Mac,
    }

    fn flip(envelope: &mut Envelope, field: Field, bit: usize) {
        let bytes: &mut [u8] = match field {
            Field::Ciphertext => &mut envelope.encrypted_content.ciphertext,
            Field::Nonce => &mut envelope.encrypted_content.nonce,
            Field::Tag => &mut envelope.encrypted_content.tag,
            Field::WrappedKey => &mut envelope.encrypted_key.ciphertext,
            Field::Mac => &mut envelope.encrypted_key.mac,
        };
        let index = (bit / 8) % bytes.len();
        bytes[index] ^= 1 << (bit % 8);
    }

    fn field_strategy() -> impl Strategy<Value = Field> {
        prop_oneof![
            Just(Field::Ciphertext),
            Just(Field::Nonce),
            Just(Field::Tag),
            Just(Field::WrappedKey),
            Just(Field::Mac),
        ]
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            from in ".{0,32}",
            to in ".{0,32}",
            subject in ".{0,64}",
            body in ".{0,512}",
            timestamp in proptest::option::of(any::<u64>()),
            seed in any::<u64>(),
        ) {
            let (secret, public) = test_keypair();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);

            let mut content = MessageContent::new(from, to, subject, body);
            if let Some(ts) = timestamp {
                content = content.with_timestamp(ts);
            }

            let envelope = encrypt(&content, &public, NOW, &mut rng).unwrap();
            let decrypted = decrypt(&envelope, &secret).unwrap();
            prop_assert_eq!(decrypted, content.canonicalize(NOW));
        }

        #[test]
        fn prop_any_bit_flip_is_detected(
            field in field_strategy(),
            bit in any::<usize>(),
            seed in any::<u64>(),
        ) {
            let (secret, public) = test_keypair();
            let mut rng = ChaCha20Rng::seed_from_u64(seed);
            let mut envelope = encrypt(&scenario_content(), &public, NOW, &mut rng).unwrap();

            flip(&mut envelope, field, bit);

            let result = decrypt(&envelope, &secret);
            prop_assert!(
                matches!(result, Err(CryptoError::Integrity { .. })),
                "flip in {:?} not detected: {:?}", field, result
            );
        }
    }
}
