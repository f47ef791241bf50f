//! Fuzz target for Envelope::from_json_bytes and decrypt
//!
//! Envelope bytes come from content-addressed storage and are untrusted.
//!
//! # Invariants
//!
//! - Decoding NEVER panics; malformed input returns an error
//! - A decoded envelope re-encodes to bytes that decode to the same value
//! - Decrypting a decoded envelope NEVER panics

#![no_main]

use chainmail_crypto::{Envelope, RecipientSecretKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(envelope) = Envelope::from_json_bytes(data) else {
        return;
    };

    let encoded = envelope.to_json_bytes().expect("decoded envelope re-encodes");
    let again = Envelope::from_json_bytes(&encoded).expect("re-encoded envelope decodes");
    assert_eq!(envelope, again);

    let key = RecipientSecretKey::from_bytes(&[7u8; 32]).expect("fixed scalar is valid");
    let _ = chainmail_crypto::decrypt(&envelope, &key);
});
