//! Fixed-size ledger identifiers.
//!
//! Every identifier renders as `0x`-prefixed lowercase hex, both in `Display`
//! and in its serde representation.

use sha3::{Digest, Keccak256};

/// Defines a byte-array newtype with hex rendering and parsing.
macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Size in bytes.
            pub const LEN: usize = $len;

            /// The all-zero value.
            pub const ZERO: Self = Self([0u8; $len]);

            /// Raw bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Whether every byte is zero.
            pub fn is_zero(&self) -> bool {
                self.0.iter().all(|b| *b == 0)
            }

            /// `0x`-prefixed lowercase hex.
            pub fn to_hex(&self) -> String {
                chainmail_crypto::to_prefixed_hex(&self.0)
            }

            /// Parse `0x`-prefixed hex of exactly the right length.
            pub fn from_hex(text: &str) -> Result<Self, $crate::error::DecodeError> {
                chainmail_crypto::from_prefixed_hex_array::<$len>(text)
                    .map(Self)
                    .map_err(|e| $crate::error::DecodeError::Hex(e.to_string()))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = $crate::error::DecodeError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::from_hex(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_hex()
            }
        }
    };
}

pub(crate) use hex_newtype;

hex_newtype!(
    /// Ledger identity of a mailbox owner: `keccak256(lowercase(trim(email)))`.
    IdentityId,
    32
);

hex_newtype!(
    /// 20-byte ledger account.
    Address,
    20
);

hex_newtype!(
    /// Hash of a ledger transaction.
    TxHash,
    32
);

/// Keccak-256 digest of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let digest = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&digest);
    output
}

impl IdentityId {
    /// Identity for an email address.
    ///
    /// Surrounding whitespace and letter case are ignored, so `" A@X "` and
    /// `"a@x"` map to the same identity.
    pub fn from_email(email: &str) -> Self {
        Self(keccak256(email.trim().to_lowercase().as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_identity_is_normalized() {
        assert_eq!(
            IdentityId::from_email(" Alice@Example.COM "),
            IdentityId::from_email("alice@example.com")
        );
        assert_ne!(
            IdentityId::from_email("alice@example.com"),
            IdentityId::from_email("bob@example.com")
        );
    }

    #[test]
    fn keccak_matches_known_vector() {
        // keccak256("") as used by the EVM
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn hex_roundtrip_and_display() {
        let address = Address([0xAB; 20]);
        let text = address.to_string();
        assert_eq!(text, format!("0x{}", "ab".repeat(20)));
        assert_eq!(text.parse::<Address>().unwrap(), address);
        assert_eq!(format!("{address:?}"), format!("Address({text})"));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(Address::from_hex(&IdentityId::ZERO.to_hex()).is_err());
        assert!(IdentityId::from_hex("0x1234").is_err());
        assert!(TxHash::from_hex("not hex").is_err());
    }

    #[test]
    fn zero_detection() {
        assert!(Address::ZERO.is_zero());
        let mut bytes = [0u8; 20];
        bytes[2] = 1;
        assert!(!Address(bytes).is_zero());
    }
}
