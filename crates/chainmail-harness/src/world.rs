//! One simulated deployment: every collaborator plus a seeded environment.

use std::sync::Arc;

use chainmail_core::{
    Address, Capabilities, ChainmailConfig, Dispatcher, EnvRng, IdentityId, Ingestor, Mailbox,
    Storage,
};
use chainmail_crypto::RecipientSecretKey;

use crate::{SimContentStore, SimEnv, SimHandleIndex, SimLedger, SimProver, SimResolver};

/// Ledger account a simulated user registers with.
pub fn account_for(email: &str) -> Address {
    let id = IdentityId::from_email(email);
    let mut address = [0u8; 20];
    address.copy_from_slice(&id.as_bytes()[12..]);
    Address(address)
}

/// A complete simulated deployment.
///
/// Each field is a handle onto shared state, so a test can arm faults or
/// inspect collaborators while the protocol runs against [`Self::caps`].
#[derive(Clone)]
pub struct SimWorld {
    /// Seeded environment
    pub env: SimEnv,
    /// Ledger
    pub ledger: SimLedger,
    /// Content store
    pub store: SimContentStore,
    /// Prover
    pub prover: SimProver,
    /// Key directory
    pub resolver: SimResolver,
    /// External handle index
    pub handle_index: SimHandleIndex,
}

impl SimWorld {
    /// Fresh world seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            env: SimEnv::with_seed(seed),
            ledger: SimLedger::new(),
            store: SimContentStore::new(),
            prover: SimProver::new(),
            resolver: SimResolver::new(),
            handle_index: SimHandleIndex::new(),
        }
    }

    /// Capabilities over this world, with the external handle index.
    pub fn caps(&self) -> Capabilities {
        Capabilities {
            ledger: Arc::new(self.ledger.clone()),
            content_store: Arc::new(self.store.clone()),
            prover: Arc::new(self.prover.clone()),
            resolver: Arc::new(self.resolver.clone()),
            handle_index: Some(Arc::new(self.handle_index.clone())),
        }
    }

    /// Capabilities with no external handle index.
    pub fn caps_without_index(&self) -> Capabilities {
        Capabilities { handle_index: None, ..self.caps() }
    }

    /// Register `email` on the ledger and publish a fresh key for it.
    ///
    /// # Panics
    ///
    /// Panics if the seeded RNG yields no valid scalar, which a ChaCha stream
    /// never does in practice.
    #[allow(clippy::expect_used)]
    pub fn register_user(&self, email: &str) -> RecipientSecretKey {
        let secret = RecipientSecretKey::generate(&mut EnvRng::new(&self.env))
            .expect("seeded ChaCha produced a valid scalar");
        self.ledger.register(email, account_for(email));
        self.resolver.publish(email, &secret.public_key());
        secret
    }

    /// Dispatcher over this world.
    pub fn dispatcher<S: Storage>(
        &self,
        storage: S,
        config: &ChainmailConfig,
    ) -> Dispatcher<S, SimEnv> {
        Dispatcher::new(self.caps(), storage, self.env.clone(), config.dispatch.clone())
    }

    /// Ingestor over this world.
    pub fn ingestor<S: Storage>(&self, storage: S, config: &ChainmailConfig) -> Ingestor<S> {
        Ingestor::new(&self.caps(), storage, config.ingest.clone())
    }

    /// Mailbox over this world.
    pub fn mailbox<S: Storage>(&self, storage: S) -> Mailbox<S> {
        Mailbox::new(&self.caps(), storage)
    }
}
