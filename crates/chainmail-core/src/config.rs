//! Configuration for dispatch, ingestion and local storage.
//!
//! Every option has a default, so an empty TOML document is a valid
//! configuration. Unknown keys are rejected rather than ignored.
//!
//! ```toml
//! [dispatch]
//! step_timeout_ms = 30000
//! verify_proof_locally = true
//! pin_content = true
//!
//! [ingest]
//! start_block = 0
//! channel_capacity = 256
//! identities = ["0x…"]
//!
//! [storage]
//! path = "chainmail.redb"
//! ```

use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, ids::IdentityId};

/// Default bound on a single dispatch step.
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 30_000;

/// Default capacity of the ingest event channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChainmailConfig {
    /// Outbound dispatch options
    pub dispatch: DispatchConfig,
    /// Event ingestion options
    pub ingest: IngestConfig,
    /// Local index storage options
    pub storage: StorageConfig,
}

/// Outbound dispatch options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    /// Bound on each dispatch step in milliseconds. `None` waits forever.
    pub step_timeout_ms: Option<u64>,
    /// Verify the generated proof before submitting it
    pub verify_proof_locally: bool,
    /// Pin the stored envelope after upload
    pub pin_content: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            step_timeout_ms: Some(DEFAULT_STEP_TIMEOUT_MS),
            verify_proof_locally: true,
            pin_content: true,
        }
    }
}

impl DispatchConfig {
    /// Step bound as a `Duration`.
    pub fn step_timeout(&self) -> Option<Duration> {
        self.step_timeout_ms.map(Duration::from_millis)
    }
}

/// Event ingestion options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IngestConfig {
    /// First block to replay when no sync cursor is persisted
    pub start_block: u64,
    /// Capacity of the live event channel
    pub channel_capacity: usize,
    /// Only index mail involving these identities. Empty indexes everything.
    pub identities: Vec<IdentityId>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            start_block: 0,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            identities: Vec::new(),
        }
    }
}

impl IngestConfig {
    /// Whether mail between `sender` and `recipient` passes the identity filter.
    pub fn watches(&self, sender: &IdentityId, recipient: &IdentityId) -> bool {
        self.identities.is_empty()
            || self.identities.iter().any(|id| id == sender || id == recipient)
    }
}

/// Local index storage options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    /// Durable redb file. `None` keeps the index in memory.
    pub path: Option<PathBuf>,
}

impl ChainmailConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside their allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.step_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid {
                field: "dispatch.step_timeout_ms",
                reason: "must be > 0 when set".to_string(),
            });
        }

        if self.ingest.channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "ingest.channel_capacity",
                reason: "must be > 0".to_string(),
            });
        }

        if self.ingest.identities.iter().any(IdentityId::is_zero) {
            return Err(ConfigError::Invalid {
                field: "ingest.identities",
                reason: "zero identity id".to_string(),
            });
        }

        Ok(())
    }
}
