//! Ledger event ingestion.
//!
//! Materializes the local mail index from `MailSent` events in two phases:
//!
//! ```text
//!  cursor (or start_block)        current block
//!        │                             │
//!        ▼                             ▼
//!        ├──────── catch-up ───────────┤
//!                                      ├──────── live ───────────▶
//! ```
//!
//! Live delivery starts at the block that ended catch-up, inclusive. The
//! boundary block may therefore be applied twice, which the idempotent upsert
//! absorbs. Overlap is accepted, a gap never is.
//!
//! # Invariants
//!
//! - The sync cursor only moves past a block once every log at or before it
//!   has been applied
//! - A storage failure stops ingestion instead of skipping the record
//! - Applying the same log any number of times equals applying it once

use std::sync::Arc;

use tokio::{sync::mpsc, task::JoinHandle};

use crate::{
    capabilities::{Capabilities, Ledger},
    commitment::CommitmentMapper,
    config::IngestConfig,
    error::Error,
    events::{DecodedLog, LogEntry, MailSentEvent},
    record::{IndexedMail, UpsertOutcome},
    storage::Storage,
};

/// A mail that was newly indexed or gained a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestEvent {
    /// Index entry after the upsert
    pub mail: IndexedMail,
    /// `Inserted` or `Updated`
    pub outcome: UpsertOutcome,
}

/// Summary of a catch-up pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatchUp {
    /// First block replayed
    pub from_block: u64,
    /// Last block replayed; live delivery starts here
    pub to_block: u64,
    /// Logs that produced an index change
    pub changed: usize,
}

/// Applies ledger logs to the local index.
#[derive(Clone)]
pub struct Ingestor<S: Storage> {
    ledger: Arc<dyn Ledger>,
    mapper: CommitmentMapper<S>,
    storage: S,
    config: IngestConfig,
}

impl<S: Storage> Ingestor<S> {
    /// Create an ingestor over `storage`.
    pub fn new(caps: &Capabilities, storage: S, config: IngestConfig) -> Self {
        Self {
            ledger: Arc::clone(&caps.ledger),
            mapper: CommitmentMapper::new(storage.clone(), caps.handle_index.clone()),
            storage,
            config,
        }
    }

    /// First block the next catch-up replays.
    ///
    /// The cursor block itself is replayed: it may have been only partly
    /// applied when the previous run stopped.
    pub fn resume_block(&self) -> Result<u64, Error> {
        Ok(self.storage.sync_cursor()?.unwrap_or(self.config.start_block))
    }

    /// Replay `[resume_block, current_block]` and move the cursor to the end.
    pub async fn catch_up(&self) -> Result<CatchUp, Error> {
        let from_block = self.resume_block()?;
        let to_block = self.ledger.current_block().await?;

        let mut changed = 0;
        if from_block <= to_block {
            for log in self.ledger.logs_in_range(from_block, to_block).await? {
                if self.apply_log(&log).await?.is_some() {
                    changed += 1;
                }
            }
            self.storage.advance_sync_cursor(to_block)?;
        }

        tracing::info!(from_block, to_block, changed, "catch-up complete");

        Ok(CatchUp { from_block, to_block, changed })
    }

    /// Apply one ledger log.
    ///
    /// Returns the resulting event when the index changed. Logs of other
    /// events, partial `MailSent` logs and mail outside the identity filter
    /// are skipped.
    ///
    /// # Errors
    ///
    /// Only local storage failures. An unresolvable handle is indexed as
    /// `None` and logged.
    pub async fn apply_log(&self, log: &LogEntry) -> Result<Option<IngestEvent>, Error> {
        let event = match MailSentEvent::decode(log) {
            Some(DecodedLog::Complete(event)) => Some(event),
            Some(DecodedLog::Partial(partial)) => {
                tracing::warn!(block = log.block_number, "dropping {partial}");
                None
            },
            None => None,
        };

        let change = match event {
            Some(event) if self.config.watches(&event.sender, &event.recipient) => {
                self.index(&event).await?
            },
            _ => None,
        };

        self.storage.advance_sync_cursor(log.block_number)?;

        Ok(change)
    }

    async fn index(&self, event: &MailSentEvent) -> Result<Option<IngestEvent>, Error> {
        let handle = match self.mapper.resolve_or_fallback(&event.commitment).await {
            Ok(handle) => Some(handle),
            Err(err @ Error::Storage(_)) => return Err(err),
            Err(err) => {
                tracing::warn!(
                    mail_id = event.mail_id,
                    commitment = %event.commitment,
                    error = %err,
                    "handle unresolved, indexing without it"
                );
                None
            },
        };

        let indexed = event.to_indexed(handle);
        let outcome = self.storage.upsert_mail(&indexed)?;

        tracing::debug!(mail_id = event.mail_id, block = event.block_number, ?outcome, "applied");

        if outcome == UpsertOutcome::Unchanged {
            return Ok(None);
        }

        let mail = self.storage.load_mail(event.mail_id)?.unwrap_or(indexed);
        Ok(Some(IngestEvent { mail, outcome }))
    }

    /// Catch up, then follow the ledger live.
    ///
    /// Catch-up changes are applied but not reported; the returned
    /// [`Subscription`] carries only changes from the live phase.
    pub async fn start(&self) -> Result<Subscription, Error> {
        let catch_up = self.catch_up().await?;
        let mut logs = self.ledger.subscribe(catch_up.to_block).await?;

        let (tx, events) = mpsc::channel(self.config.channel_capacity);
        let ingestor = self.clone();

        let task = tokio::spawn(async move {
            while let Some(log) = logs.recv().await {
                match ingestor.apply_log(&log).await {
                    Ok(Some(event)) => {
                        if tx.send(event).await.is_err() {
                            tracing::debug!("subscription receiver dropped");
                            return Ok(());
                        }
                    },
                    Ok(None) => {},
                    Err(err) => {
                        tracing::error!(
                            block = log.block_number,
                            error = %err,
                            "ingestion stopped"
                        );
                        return Err(err);
                    },
                }
            }
            tracing::info!("ledger subscription closed");
            Ok(())
        });

        Ok(Subscription { events, task })
    }
}

/// Handle to live ingestion.
///
/// Dropping it cancels the background task. [`recv`](Self::recv) returns
/// `None` both when the ledger closes the subscription and when a storage
/// failure stops ingestion; [`join`](Self::join) tells them apart.
pub struct Subscription {
    events: mpsc::Receiver<IngestEvent>,
    task: JoinHandle<Result<(), Error>>,
}

impl Subscription {
    /// Next live index change. `None` once ingestion has stopped.
    pub async fn recv(&mut self) -> Option<IngestEvent> {
        self.events.recv().await
    }

    /// Wait for the background task and report why it stopped.
    ///
    /// # Errors
    ///
    /// The error that stopped ingestion, typically [`Error::Storage`]. A
    /// closed subscription or a cancelled task is `Ok`.
    pub async fn join(mut self) -> Result<(), Error> {
        match (&mut self.task).await {
            Ok(result) => result,
            Err(err) if err.is_cancelled() => Ok(()),
            Err(err) => Err(Error::IngestTask(err.to_string())),
        }
    }

    /// Stop the background task.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the background task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}
