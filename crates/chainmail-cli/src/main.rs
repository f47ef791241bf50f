//! Chainmail command-line tool.
//!
//! # Usage
//!
//! ```bash
//! # Create a recipient keypair
//! chainmail keygen
//!
//! # Seal a message to a recipient public key, then open it
//! chainmail seal --key 0x04… --from a@x --to b@x --subject hi --body hello > mail.json
//! chainmail open --key 0x… --input mail.json
//!
//! # Commitment the ledger stores for a content handle
//! chainmail commit bafy…
//!
//! # List the durable index named by the config file
//! chainmail --config chainmail.toml inbox b@x
//! ```

mod commands;

use std::{
    io::{Read, Write},
    path::PathBuf,
};

use chainmail_core::{Folder, SystemEnv};
use chainmail_crypto::MessageContent;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chainmail envelope and index tool
#[derive(Parser, Debug)]
#[command(name = "chainmail")]
#[command(about = "Seal, open and list ledger-anchored encrypted mail")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a recipient keypair
    Keygen,

    /// Encrypt a message to a recipient public key
    Seal {
        /// Recipient public key (0x-prefixed SEC1 hex)
        #[arg(short, long)]
        key: String,
        /// Sender email
        #[arg(long)]
        from: String,
        /// Recipient email
        #[arg(long)]
        to: String,
        /// Subject line
        #[arg(long, default_value = "")]
        subject: String,
        /// Message body; read from stdin when absent
        #[arg(long)]
        body: Option<String>,
    },

    /// Decrypt an envelope with a recipient secret key
    Open {
        /// Recipient secret key (0x-prefixed hex)
        #[arg(short, long)]
        key: String,
        /// Envelope JSON file; stdin when absent
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the ledger commitment for a content handle
    Commit {
        /// Content-addressed storage handle
        handle: String,
    },

    /// List mail received by an identity
    Inbox {
        /// Identity email
        email: String,
    },

    /// List mail sent by an identity
    Sent {
        /// Identity email
        email: String,
    },
}

fn read_stdin() -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    std::io::stdin().lock().read_to_end(&mut buf)?;
    Ok(buf)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = commands::load_config(args.config.as_deref())?;
    let env = SystemEnv::new();
    let mut out = std::io::stdout().lock();

    match args.command {
        Command::Keygen => commands::keygen(&env, &mut out)?,
        Command::Seal { key, from, to, subject, body } => {
            let body = match body {
                Some(body) => body,
                None => String::from_utf8(read_stdin()?)?,
            };
            let content = MessageContent::new(from, to, subject, body);
            commands::seal(&env, &content, &key, &mut out)?;
        },
        Command::Open { key, input } => {
            let bytes = match input {
                Some(path) => std::fs::read(path)?,
                None => read_stdin()?,
            };
            commands::open(&bytes, &key, &mut out)?;
        },
        Command::Commit { handle } => commands::commitment(&handle, &mut out)?,
        Command::Inbox { email } => commands::list(&config, &email, Folder::Inbox, &mut out)?,
        Command::Sent { email } => commands::list(&config, &email, Folder::Sent, &mut out)?,
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_config_after_subcommand() {
        let args =
            Args::try_parse_from(["chainmail", "inbox", "b@x", "--config", "c.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("c.toml")));
        assert!(matches!(args.command, Command::Inbox { ref email } if email == "b@x"));
    }

    #[test]
    fn seal_requires_key() {
        let result = Args::try_parse_from(["chainmail", "seal", "--from", "a", "--to", "b"]);
        assert!(result.is_err());
    }
}
