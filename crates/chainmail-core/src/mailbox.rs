//! Reading indexed mail.
//!
//! ```text
//! mail id → IndexedMail → handle → envelope bytes → Envelope → MessageContent
//! ```

use std::sync::Arc;

use chainmail_crypto::{Envelope, MessageContent, RecipientSecretKey};

use crate::{
    capabilities::{Capabilities, ContentStore},
    commitment::CommitmentMapper,
    error::Error,
    ids::IdentityId,
    record::{Folder, IndexedMail},
    storage::Storage,
};

/// Read access to the local index and stored envelopes.
#[derive(Clone)]
pub struct Mailbox<S: Storage> {
    content_store: Arc<dyn ContentStore>,
    mapper: CommitmentMapper<S>,
    storage: S,
}

impl<S: Storage> Mailbox<S> {
    /// Create a mailbox over `storage`.
    pub fn new(caps: &Capabilities, storage: S) -> Self {
        Self {
            content_store: Arc::clone(&caps.content_store),
            mapper: CommitmentMapper::new(storage.clone(), caps.handle_index.clone()),
            storage,
        }
    }

    /// Fetch and decrypt a mail.
    ///
    /// An entry indexed without a handle is resolved again through the
    /// commitment map and its fallback; a successful resolution is written
    /// back to the index.
    ///
    /// # Errors
    ///
    /// - `UnknownMail`: the id is not indexed
    /// - `HandleNotFound`: the commitment cannot be mapped to a handle
    /// - `ContentStore`: the envelope could not be fetched
    /// - `Integrity`, `UnsupportedVersion`, `Crypto`: the envelope did not
    ///   decrypt under `key`
    pub async fn open(
        &self,
        mail_id: u64,
        key: &RecipientSecretKey,
    ) -> Result<MessageContent, Error> {
        let mut mail = self.storage.load_mail(mail_id)?.ok_or(Error::UnknownMail(mail_id))?;

        let handle = match mail.handle.clone() {
            Some(handle) => handle,
            None => {
                let handle = self.mapper.resolve_or_fallback(&mail.record.commitment).await?;
                mail.handle = Some(handle.clone());
                self.storage.upsert_mail(&mail)?;
                handle
            },
        };

        let bytes = self.content_store.get(&handle).await?;
        let envelope = Envelope::from_json_bytes(&bytes)?;
        let content = chainmail_crypto::decrypt(&envelope, key)?;

        tracing::debug!(mail_id, handle = %handle, "mail opened");

        Ok(content)
    }

    /// Mail received by `identity`, ordered by id.
    pub fn inbox(&self, identity: &IdentityId) -> Result<Vec<IndexedMail>, Error> {
        Ok(self.storage.list_folder(Folder::Inbox, identity)?)
    }

    /// Mail sent by `identity`, ordered by id.
    pub fn sent(&self, identity: &IdentityId) -> Result<Vec<IndexedMail>, Error> {
        Ok(self.storage.list_folder(Folder::Sent, identity)?)
    }

    /// Index entry for `mail_id`.
    pub fn get(&self, mail_id: u64) -> Result<Option<IndexedMail>, Error> {
        Ok(self.storage.load_mail(mail_id)?)
    }
}
