//! Outbound mail dispatch.
//!
//! One strictly sequential flow per message:
//!
//! ```text
//! Resolve → Encrypt → Store → Commit → Prove → Submit → Index
//! ```
//!
//! Steps are never retried internally. The first failure aborts the flow and
//! surfaces as [`Error::DispatchStepFailure`] naming the step. Nothing reaches
//! the ledger before [`DispatchStep::Submit`], so a failure at an earlier step
//! leaves at most an unreferenced stored envelope behind.
//!
//! The commitment is remembered locally before submission. Once the ledger
//! accepts the mail, this node can always resolve it back to its handle, even
//! if the Index step or the process dies afterwards. An Index failure carries
//! the [`DispatchReceipt`] and is not recoverable; ingestion indexes the mail
//! from the ledger instead of a second dispatch.

use std::{fmt, future::Future};

use chainmail_crypto::{MessageContent, RecipientPublicKey};

use crate::{
    capabilities::{Capabilities, MailSubmission, TxReceipt},
    commitment::{Commitment, CommitmentMapper},
    config::DispatchConfig,
    env::{EnvRng, Environment},
    error::{Error, LedgerError, ResolverError},
    events::{DecodedLog, MailSentEvent},
    ids::{Address, IdentityId, TxHash},
    proof::{Proof, ProofRequest},
    storage::Storage,
};

/// A named stage of the dispatch flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchStep {
    /// Look up the recipient's owning account
    Resolve,
    /// Fetch the recipient key and seal the envelope
    Encrypt,
    /// Upload (and optionally pin) the envelope
    Store,
    /// Derive and remember the commitment
    Commit,
    /// Generate (and optionally verify) the ownership proof
    Prove,
    /// Submit to the ledger and read the assigned mail id
    Submit,
    /// Record the mail in the local index
    Index,
}

impl DispatchStep {
    /// Every step, in execution order.
    pub const ALL: [Self; 7] = [
        Self::Resolve,
        Self::Encrypt,
        Self::Store,
        Self::Commit,
        Self::Prove,
        Self::Submit,
        Self::Index,
    ];

    /// Lowercase step name, as used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Encrypt => "encrypt",
            Self::Store => "store",
            Self::Commit => "commit",
            Self::Prove => "prove",
            Self::Submit => "submit",
            Self::Index => "index",
        }
    }
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a completed dispatch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    /// Ledger-assigned mail id
    pub mail_id: u64,
    /// Content store handle of the envelope
    pub handle: String,
    /// Commitment anchored on the ledger
    pub commitment: Commitment,
    /// Submitting transaction
    pub tx_hash: TxHash,
    /// Block the transaction was mined in
    pub block_number: u64,
}

/// Runs the dispatch flow against injected collaborators.
///
/// Cheap to clone; independent dispatches may run concurrently and share
/// only the local storage.
pub struct Dispatcher<S: Storage, E: Environment> {
    caps: Capabilities,
    mapper: CommitmentMapper<S>,
    storage: S,
    env: E,
    config: DispatchConfig,
}

impl<S: Storage, E: Environment> Clone for Dispatcher<S, E> {
    fn clone(&self) -> Self {
        Self {
            caps: self.caps.clone(),
            mapper: self.mapper.clone(),
            storage: self.storage.clone(),
            env: self.env.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Storage, E: Environment> Dispatcher<S, E> {
    /// Create a dispatcher.
    pub fn new(caps: Capabilities, storage: S, env: E, config: DispatchConfig) -> Self {
        let mapper = CommitmentMapper::new(storage.clone(), caps.handle_index.clone());
        Self { caps, mapper, storage, env, config }
    }

    /// Whether `email` has a registered owner on the ledger.
    pub async fn is_recipient_registered(&self, email: &str) -> Result<bool, Error> {
        let identity = IdentityId::from_email(email);
        Ok(self.caps.ledger.is_registered(&identity).await?)
    }

    /// Send `content` from the account `sender_address`.
    ///
    /// # Errors
    ///
    /// Always [`Error::DispatchStepFailure`]; the cause is one of:
    ///
    /// - `RecipientUnregistered`: no owner for the recipient (Resolve)
    /// - `Resolver`, `Crypto`: no usable recipient key (Encrypt)
    /// - `ContentStore`: upload or pin failed (Store)
    /// - `Storage`: commitment could not be remembered (Commit) or indexed
    ///   (Index)
    /// - `Prover`, `ProofInvalid`: proof generation or local check failed
    ///   (Prove)
    /// - `Ledger`: rejected, unreachable or no `MailSent` event (Submit)
    /// - `StepTimeout`: the step exceeded `step_timeout_ms`
    ///
    /// An Index failure also carries the receipt
    /// ([`Error::dispatch_receipt`]): the mail is delivered and must not be
    /// dispatched again.
    pub async fn dispatch(
        &self,
        content: &MessageContent,
        sender_address: Address,
    ) -> Result<DispatchReceipt, Error> {
        let sender = IdentityId::from_email(content.sender());
        let recipient = IdentityId::from_email(content.recipient());

        let owner = self.run_step(DispatchStep::Resolve, self.resolve(content, &recipient)).await?;
        let envelope =
            self.run_step(DispatchStep::Encrypt, self.encrypt(content, &owner)).await?;
        let handle = self.run_step(DispatchStep::Store, self.store(envelope)).await?;
        let commitment = self
            .run_step(DispatchStep::Commit, async {
                Ok(self.mapper.commit_and_remember(&handle)?)
            })
            .await?;
        let request = ProofRequest::new(content.sender(), sender_address, commitment);
        let proof = self.run_step(DispatchStep::Prove, self.prove(&request)).await?;

        let submission = MailSubmission {
            proof,
            public_signals: request.public_signals,
            commitment,
            sender,
            recipient,
            from: sender_address,
        };
        let (tx, event) = self.run_step(DispatchStep::Submit, self.submit(&submission)).await?;

        let mut indexed = event.to_indexed(Some(handle.clone()));
        indexed.tx_hash = Some(tx.tx_hash);
        if indexed.block_number == 0 {
            indexed.block_number = tx.block_number;
        }
        let receipt = DispatchReceipt {
            mail_id: event.mail_id,
            handle,
            commitment,
            tx_hash: tx.tx_hash,
            block_number: tx.block_number,
        };

        let indexing =
            self.bounded(DispatchStep::Index, async { Ok(self.storage.upsert_mail(&indexed)?) });
        if let Err(cause) = indexing.await {
            tracing::error!(
                mail_id = receipt.mail_id,
                tx_hash = %receipt.tx_hash,
                error = %cause,
                "mail delivered but not indexed"
            );
            return Err(Error::DispatchStepFailure {
                step: DispatchStep::Index,
                cause: Box::new(cause),
                receipt: Some(Box::new(receipt)),
            });
        }

        tracing::info!(
            mail_id = receipt.mail_id,
            commitment = %commitment,
            tx_hash = %receipt.tx_hash,
            block = receipt.block_number,
            "mail dispatched"
        );

        Ok(receipt)
    }

    /// Run one step under the configured bound, naming it on failure.
    async fn run_step<T>(
        &self,
        step: DispatchStep,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        self.bounded(step, fut).await.map_err(|cause| {
            tracing::warn!(%step, error = %cause, "dispatch step failed");
            Error::DispatchStepFailure { step, cause: Box::new(cause), receipt: None }
        })
    }

    async fn bounded<T>(
        &self,
        step: DispatchStep,
        fut: impl Future<Output = Result<T, Error>>,
    ) -> Result<T, Error> {
        tracing::debug!(%step, "dispatch step starting");

        match self.config.step_timeout() {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .unwrap_or_else(|_| Err(Error::StepTimeout { step, after })),
            None => fut.await,
        }
    }

    async fn resolve(
        &self,
        content: &MessageContent,
        recipient: &IdentityId,
    ) -> Result<Address, Error> {
        match self.caps.ledger.resolve_owner(recipient).await? {
            Some(owner) if !owner.is_zero() => Ok(owner),
            _ => Err(Error::RecipientUnregistered { email: content.recipient().to_string() }),
        }
    }

    async fn encrypt(&self, content: &MessageContent, owner: &Address) -> Result<Vec<u8>, Error> {
        let email = content.recipient();
        let resolved = self.caps.resolver.resolve(email, owner).await?;
        let public_key = RecipientPublicKey::from_sec1_bytes(&resolved.public_key)
            .map_err(|_| ResolverError::InvalidKey { email: email.to_string() })?;

        let envelope = chainmail_crypto::encrypt(
            content,
            &public_key,
            self.env.wall_clock_millis(),
            &mut EnvRng::new(&self.env),
        )?;

        Ok(envelope.to_json_bytes()?)
    }

    async fn store(&self, envelope: Vec<u8>) -> Result<String, Error> {
        let handle = self.caps.content_store.put(envelope).await?;
        if self.config.pin_content {
            self.caps.content_store.pin(&handle).await?;
        }
        Ok(handle)
    }

    async fn prove(&self, request: &ProofRequest) -> Result<Proof, Error> {
        let proof = self.caps.prover.prove(request).await?;

        if self.config.verify_proof_locally
            && !self.caps.prover.verify(&proof, &request.public_signals).await?
        {
            return Err(Error::ProofInvalid);
        }

        Ok(proof)
    }

    async fn submit(
        &self,
        submission: &MailSubmission,
    ) -> Result<(TxReceipt, MailSentEvent), Error> {
        let receipt = self.caps.ledger.submit(submission).await?;
        let event = first_mail_sent(&receipt)?;
        Ok((receipt, event))
    }
}

/// The mail id comes only from the receipt: the first complete `MailSent`.
fn first_mail_sent(receipt: &TxReceipt) -> Result<MailSentEvent, LedgerError> {
    let mut events = Vec::new();
    for log in &receipt.logs {
        match MailSentEvent::decode(log) {
            Some(DecodedLog::Complete(event)) => events.push(event),
            Some(DecodedLog::Partial(partial)) => {
                tracing::warn!(tx_hash = %receipt.tx_hash, "{partial}");
            },
            None => {},
        }
    }

    if events.len() > 1 {
        tracing::warn!(
            tx_hash = %receipt.tx_hash,
            count = events.len(),
            "multiple MailSent events in one receipt, using the first"
        );
    }

    events
        .into_iter()
        .next()
        .ok_or_else(|| LedgerError::MissingMailSent { tx_hash: receipt.tx_hash.to_hex() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{commitment::commit, events::LogEntry};

    fn event(mail_id: u64) -> MailSentEvent {
        MailSentEvent {
            mail_id,
            recipient: IdentityId::from_email("b@x"),
            sender: IdentityId::from_email("a@x"),
            commitment: commit("bafyA"),
            timestamp: 1,
            block_number: 3,
            tx_hash: Some(TxHash([1; 32])),
        }
    }

    fn receipt(logs: Vec<LogEntry>) -> TxReceipt {
        TxReceipt { tx_hash: TxHash([1; 32]), block_number: 3, logs }
    }

    #[test]
    fn step_names_are_lowercase() {
        let names: Vec<String> = DispatchStep::ALL.iter().map(ToString::to_string).collect();
        assert_eq!(names, ["resolve", "encrypt", "store", "commit", "prove", "submit", "index"]);
    }

    #[test]
    fn first_mail_sent_wins() {
        let unrelated = LogEntry {
            block_number: 3,
            tx_hash: Some(TxHash([1; 32])),
            topics: vec![[0xaa; 32]],
            data: Vec::new(),
        };
        let logs = vec![unrelated, event(4).to_log(), event(5).to_log()];

        assert_eq!(first_mail_sent(&receipt(logs)).unwrap().mail_id, 4);
    }

    #[test]
    fn partial_events_are_skipped() {
        let mut partial = event(4).to_log();
        partial.data.clear();

        let found = first_mail_sent(&receipt(vec![partial, event(9).to_log()])).unwrap();
        assert_eq!(found.mail_id, 9);
    }

    #[test]
    fn receipt_without_mail_sent_is_an_error() {
        let err = first_mail_sent(&receipt(Vec::new())).unwrap_err();
        assert!(matches!(err, LedgerError::MissingMailSent { .. }));
        assert!(!err.is_transient());
    }
}
