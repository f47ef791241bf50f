//! Command implementations.
//!
//! Each command writes its result to the given writer so the binary can point
//! it at stdout and tests can capture it.

use std::{io::Write, path::Path};

use chainmail_core::{
    ChainmailConfig, EnvRng, Environment, Folder, IdentityId, IndexedMail, RedbStorage, Storage,
    StorageError, commit,
};
use chainmail_crypto::{
    Attachment, CryptoError, Envelope, MessageContent, RecipientPublicKey, RecipientSecretKey,
};
use thiserror::Error;

/// Failures surfaced to the command line.
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration did not load
    #[error(transparent)]
    Config(#[from] chainmail_core::ConfigError),

    /// Key parsing, sealing or opening failed
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Local index failure
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The command needs a durable index but none is configured
    #[error("no storage.path configured")]
    NoStoragePath,
}

/// Load configuration from `path`, or defaults when absent.
pub fn load_config(path: Option<&Path>) -> Result<ChainmailConfig, CliError> {
    let Some(path) = path else {
        return Ok(ChainmailConfig::default());
    };

    let text = std::fs::read_to_string(path)?;
    let config = ChainmailConfig::from_toml_str(&text)?;
    tracing::debug!(path = %path.display(), "loaded configuration");
    Ok(config)
}

/// Generate a recipient keypair and print both halves.
pub fn keygen<E: Environment>(env: &E, out: &mut impl Write) -> Result<(), CliError> {
    let secret = RecipientSecretKey::generate(&mut EnvRng::new(env))?;
    writeln!(out, "secret: {}", secret.to_hex().as_str())?;
    writeln!(out, "public: {}", secret.public_key().to_hex())?;
    Ok(())
}

/// Encrypt `content` to `recipient_key` and print the envelope JSON.
pub fn seal<E: Environment>(
    env: &E,
    content: &MessageContent,
    recipient_key: &str,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let recipient = RecipientPublicKey::from_hex(recipient_key)?;
    let now_ms = env.wall_clock_millis();
    let envelope = chainmail_crypto::encrypt(content, &recipient, now_ms, &mut EnvRng::new(env))?;

    tracing::info!(size = envelope.metadata.size, "sealed envelope");
    out.write_all(&envelope.to_json_bytes()?)?;
    writeln!(out)?;
    Ok(())
}

/// Decrypt envelope JSON with `secret_key` and print the message.
pub fn open(envelope_json: &[u8], secret_key: &str, out: &mut impl Write) -> Result<(), CliError> {
    let secret = RecipientSecretKey::from_hex(secret_key)?;
    let envelope = Envelope::from_json_bytes(envelope_json)?;
    let content = chainmail_crypto::decrypt(&envelope, &secret)?;

    writeln!(out, "from: {}", content.sender())?;
    writeln!(out, "to: {}", content.recipient())?;
    writeln!(out, "subject: {}", content.subject())?;
    if let Some(timestamp) = content.timestamp() {
        writeln!(out, "timestamp: {timestamp}")?;
    }
    for attachment in content.attachments() {
        let Attachment { name, mime_type, size, .. } = attachment;
        writeln!(out, "attachment: {name} ({mime_type}, {size} bytes)")?;
    }
    writeln!(out)?;
    writeln!(out, "{}", content.body())?;
    Ok(())
}

/// Print the ledger commitment for a storage handle.
pub fn commitment(handle: &str, out: &mut impl Write) -> Result<(), CliError> {
    writeln!(out, "{}", commit(handle))?;
    Ok(())
}

/// List indexed mail for `email` from the configured durable index.
pub fn list(
    config: &ChainmailConfig,
    email: &str,
    folder: Folder,
    out: &mut impl Write,
) -> Result<(), CliError> {
    let path = config.storage.path.as_ref().ok_or(CliError::NoStoragePath)?;
    let storage = RedbStorage::open(path)?;
    let identity = IdentityId::from_email(email);

    let entries = storage.list_folder(folder, &identity)?;
    for mail in &entries {
        write_entry(mail, out)?;
    }

    tracing::info!(identity = %identity, count = entries.len(), ?folder, "listed mail");
    Ok(())
}

fn write_entry(mail: &IndexedMail, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        out,
        "{}\tblock {}\t{} -> {}\t{}",
        mail.id(),
        mail.block_number,
        mail.record.sender,
        mail.record.recipient,
        mail.handle.as_deref().unwrap_or("-"),
    )
}
