//! `0x`-prefixed lowercase hex, the encoding every byte field uses on the wire.

use crate::error::CryptoError;

/// Encode bytes as `0x`-prefixed lowercase hex.
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode `0x`-prefixed hex into bytes.
///
/// # Errors
///
/// - `Encoding`: missing prefix, odd digit count or non-hex characters
pub fn from_prefixed_hex(text: &str) -> Result<Vec<u8>, CryptoError> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| CryptoError::Encoding(format!("missing 0x prefix: {text:?}")))?;

    hex::decode(digits).map_err(|e| CryptoError::Encoding(e.to_string()))
}

/// Decode `0x`-prefixed hex into a fixed-size array.
///
/// # Errors
///
/// - `Encoding`: malformed hex or a length other than `N`
pub fn from_prefixed_hex_array<const N: usize>(text: &str) -> Result<[u8; N], CryptoError> {
    let bytes = from_prefixed_hex(text)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| CryptoError::Encoding(format!("expected {N} bytes, got {len}")))
}

/// Serde adapter for variable-length byte fields.
pub(crate) mod hex_vec {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(crate) fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_prefixed_hex(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::from_prefixed_hex(&text).map_err(D::Error::custom)
    }
}

/// Serde adapter for fixed-length byte fields.
pub(crate) mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(crate) fn serialize<S: Serializer, const N: usize>(
        bytes: &[u8; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_prefixed_hex(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[u8; N], D::Error> {
        let text = String::deserialize(deserializer)?;
        super::from_prefixed_hex_array(&text).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_lowercase_with_prefix() {
        assert_eq!(to_prefixed_hex(&[0xAB, 0x01, 0xFF]), "0xab01ff");
        assert_eq!(to_prefixed_hex(&[]), "0x");
    }

    #[test]
    fn decodes_prefixed_hex() {
        assert_eq!(from_prefixed_hex("0xab01ff").unwrap(), vec![0xAB, 0x01, 0xFF]);
        assert_eq!(from_prefixed_hex("0x").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(matches!(from_prefixed_hex("ab01"), Err(CryptoError::Encoding(_))));
    }

    #[test]
    fn rejects_odd_length_and_non_hex() {
        assert!(from_prefixed_hex("0xabc").is_err());
        assert!(from_prefixed_hex("0xzz").is_err());
    }

    #[test]
    fn fixed_array_rejects_wrong_length() {
        assert_eq!(from_prefixed_hex_array::<2>("0x0102").unwrap(), [1, 2]);

        let err = from_prefixed_hex_array::<4>("0x0102").unwrap_err();
        assert_eq!(err, CryptoError::Encoding("expected 4 bytes, got 2".to_string()));
    }
}
