//! Ownership proof tuple and its public signals.
//!
//! A Groth16 proof is `(a, b, c)` with `a, c ∈ G1` and `b ∈ G2`, carried as
//! eight 256-bit words. On the wire it is the ABI encoding of the static tuple
//! `(uint256[2], uint256[2][2], uint256[2])`: eight 32-byte big-endian words,
//! 256 bytes total, no length prefix.
//!
//! Public signals follow the circuit's declaration order
//! `[senderAddress, commitment mod r, emailHash mod r]`, where `r` is the
//! BN254 scalar field order. Digests are reduced because a 256-bit keccak
//! output can exceed the field.

use primitive_types::U256;

use crate::{
    commitment::Commitment,
    error::DecodeError,
    ids::{Address, IdentityId},
};

/// Encoded proof length.
pub const PROOF_LEN: usize = 8 * WORD_LEN;

const WORD_LEN: usize = 32;

/// BN254 scalar field order `r`, big-endian.
const BN254_SCALAR_ORDER: [u8; 32] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

/// BN254 scalar field order as an integer.
pub fn scalar_field_order() -> U256 {
    U256::from_big_endian(&BN254_SCALAR_ORDER)
}

/// Reduce a 32-byte digest into the scalar field.
pub fn to_field(digest: &[u8; 32]) -> U256 {
    U256::from_big_endian(digest) % scalar_field_order()
}

/// Groth16 proof points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Proof {
    /// G1 point `a`
    pub a: [U256; 2],
    /// G2 point `b`
    pub b: [[U256; 2]; 2],
    /// G1 point `c`
    pub c: [U256; 2],
}

impl Proof {
    fn words(&self) -> [U256; 8] {
        [
            self.a[0], self.a[1], self.b[0][0], self.b[0][1], self.b[1][0], self.b[1][1],
            self.c[0], self.c[1],
        ]
    }

    /// ABI-encode as eight big-endian words.
    pub fn encode(&self) -> [u8; PROOF_LEN] {
        let mut out = [0u8; PROOF_LEN];
        for (word, chunk) in self.words().iter().zip(out.chunks_exact_mut(WORD_LEN)) {
            word.to_big_endian(chunk);
        }
        out
    }

    /// Decode the ABI encoding.
    ///
    /// # Errors
    ///
    /// - `Length`: input is not exactly [`PROOF_LEN`] bytes
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() != PROOF_LEN {
            return Err(DecodeError::Length {
                what: "proof",
                expected: PROOF_LEN,
                got: bytes.len(),
            });
        }

        let w: Vec<U256> = bytes.chunks_exact(WORD_LEN).map(U256::from_big_endian).collect();
        Ok(Self { a: [w[0], w[1]], b: [[w[2], w[3]], [w[4], w[5]]], c: [w[6], w[7]] })
    }
}

/// Public inputs of the ownership circuit, in circuit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicSignals(pub [U256; 3]);

impl PublicSignals {
    /// Signals binding a sender account, a commitment and the sender's email
    /// hash.
    pub fn new(sender_address: &Address, commitment: &Commitment, email_hash: &IdentityId) -> Self {
        Self([
            U256::from_big_endian(sender_address.as_bytes()),
            to_field(commitment.as_bytes()),
            to_field(email_hash.as_bytes()),
        ])
    }

    /// Sender account as a field element.
    pub fn sender_address(&self) -> U256 {
        self.0[0]
    }

    /// Reduced commitment.
    pub fn commitment(&self) -> U256 {
        self.0[1]
    }

    /// Reduced sender email hash.
    pub fn email_hash(&self) -> U256 {
        self.0[2]
    }
}

/// Everything the prover needs for one ownership proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofRequest {
    /// Sender email (private witness)
    pub sender_email: String,
    /// Sender account
    pub sender_address: Address,
    /// Commitment being anchored
    pub commitment: Commitment,
    /// Public signals derived from the above
    pub public_signals: PublicSignals,
}

impl ProofRequest {
    /// Build a request, deriving the public signals.
    pub fn new(sender_email: &str, sender_address: Address, commitment: Commitment) -> Self {
        let email_hash = IdentityId::from_email(sender_email);
        Self {
            sender_email: sender_email.to_string(),
            sender_address,
            commitment,
            public_signals: PublicSignals::new(&sender_address, &commitment, &email_hash),
        }
    }
}
