//! Plaintext message content and its canonical serialization.
//!
//! Field order is fixed by the struct definition and the timestamp is pinned
//! before encryption, so canonicalizing identical input at the same instant
//! always produces identical bytes.

use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// Descriptor for a file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Attachment {
    /// File name as shown to the recipient
    pub name: String,
    /// MIME type of the attachment
    pub mime_type: String,
    /// Size in bytes
    pub size: u64,
    /// Storage handle, if the attachment was uploaded separately
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handle: Option<String>,
}

/// A message before encryption.
///
/// Immutable once built: the builder methods consume `self` and return a new
/// value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageContent {
    from: String,
    to: String,
    subject: String,
    body: String,
    #[serde(default)]
    timestamp: Option<u64>,
    #[serde(default)]
    attachments: Vec<Attachment>,
}

impl MessageContent {
    /// Create a message without timestamp or attachments.
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            timestamp: None,
            attachments: Vec::new(),
        }
    }

    /// Pin the creation time (unix milliseconds).
    #[must_use]
    pub fn with_timestamp(mut self, timestamp_ms: u64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    /// Attach file descriptors.
    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.attachments = attachments;
        self
    }

    /// Sender email identifier.
    pub fn sender(&self) -> &str {
        &self.from
    }

    /// Recipient email identifier.
    pub fn recipient(&self) -> &str {
        &self.to
    }

    /// Subject line.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Message body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Creation time in unix milliseconds, if pinned.
    pub fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    /// Attachment descriptors (empty when there are none).
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    /// Copy of this message with the timestamp fixed, defaulting to `now_ms`.
    #[must_use]
    pub fn canonicalize(&self, now_ms: u64) -> Self {
        let timestamp = self.timestamp.unwrap_or(now_ms);
        self.clone().with_timestamp(timestamp)
    }

    /// Deterministic byte encoding of the canonical form.
    pub(crate) fn to_canonical_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub(crate) fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageContent {
        MessageContent::new("a@x", "b@x", "hi", "hello")
    }

    #[test]
    fn canonicalize_assigns_missing_timestamp() {
        let canonical = sample().canonicalize(1_700_000_000_000);
        assert_eq!(canonical.timestamp(), Some(1_700_000_000_000));
    }

    #[test]
    fn canonicalize_keeps_existing_timestamp() {
        let canonical = sample().with_timestamp(42).canonicalize(1_700_000_000_000);
        assert_eq!(canonical.timestamp(), Some(42));
    }

    #[test]
    fn canonical_bytes_are_stable() {
        let a = sample().canonicalize(5).to_canonical_bytes().unwrap();
        let b = sample().canonicalize(5).to_canonical_bytes().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn canonical_field_order_is_fixed() {
        let attachment = Attachment {
            name: "a.txt".to_string(),
            mime_type: "text/plain".to_string(),
            size: 3,
            handle: None,
        };
        let bytes =
            sample().with_attachments(vec![attachment]).canonicalize(5).to_canonical_bytes();

        assert_eq!(
            String::from_utf8(bytes.unwrap()).unwrap(),
            r#"{"from":"a@x","to":"b@x","subject":"hi","body":"hello","timestamp":5,"attachments":[{"name":"a.txt","mimeType":"text/plain","size":3}]}"#
        );
    }

    #[test]
    fn canonical_bytes_roundtrip() {
        let original = sample().canonicalize(9);
        let decoded =
            MessageContent::from_canonical_bytes(&original.to_canonical_bytes().unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = MessageContent::from_canonical_bytes(
            br#"{"from":"a","to":"b","subject":"s","body":"b","cc":"c"}"#,
        );
        assert!(matches!(result, Err(CryptoError::Serialization(_))));
    }
}
