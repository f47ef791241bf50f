//! Fuzz target for Proof::decode
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - Only inputs of exactly PROOF_LEN bytes decode
//! - Decoded proofs encode back to the input bytes

#![no_main]

use chainmail_core::{PROOF_LEN, Proof};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    match Proof::decode(data) {
        Ok(proof) => {
            assert_eq!(data.len(), PROOF_LEN);
            assert_eq!(&proof.encode()[..], data);
        },
        Err(_) => assert_ne!(data.len(), PROOF_LEN),
    }
});
