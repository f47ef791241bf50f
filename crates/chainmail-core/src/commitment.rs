//! Handle ↔ commitment indirection.
//!
//! The ledger only stores fixed-size digests, so a storage handle is anchored
//! as `keccak256(utf8(handle))`. The digest is one-way: somebody must keep the
//! commitment → handle mapping or the content becomes unreachable. The
//! [`CommitmentMapper`] keeps it in local [`Storage`] and falls back to an
//! external [`HandleIndex`] on a miss.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::{
    capabilities::HandleIndex,
    error::Error,
    ids::{hex_newtype, keccak256},
    storage::{Storage, StorageError},
};

hex_newtype!(
    /// On-ledger reference to a stored envelope.
    Commitment,
    32
);

/// Commitment for a storage handle.
pub fn commit(handle: &str) -> Commitment {
    Commitment(keccak256(handle.as_bytes()))
}

/// Commitment map backed by local storage with an optional external fallback.
///
/// Clones share the same storage. Concurrent `remember` calls for one
/// commitment always carry the same handle, so last-writer-wins loses nothing.
pub struct CommitmentMapper<S: Storage> {
    storage: S,
    fallback: Option<Arc<dyn HandleIndex>>,
}

impl<S: Storage> Clone for CommitmentMapper<S> {
    fn clone(&self) -> Self {
        Self { storage: self.storage.clone(), fallback: self.fallback.clone() }
    }
}

impl<S: Storage> CommitmentMapper<S> {
    /// Create a mapper over `storage`, consulting `fallback` on local misses.
    pub fn new(storage: S, fallback: Option<Arc<dyn HandleIndex>>) -> Self {
        Self { storage, fallback }
    }

    /// Compute and remember the commitment for `handle`.
    pub fn commit_and_remember(&self, handle: &str) -> Result<Commitment, StorageError> {
        let commitment = commit(handle);
        self.remember(&commitment, handle)?;
        Ok(commitment)
    }

    /// Record `commitment → handle`.
    pub fn remember(&self, commitment: &Commitment, handle: &str) -> Result<(), StorageError> {
        self.storage.remember_handle(commitment, handle)
    }

    /// Local lookup only.
    pub fn resolve(&self, commitment: &Commitment) -> Result<Option<String>, StorageError> {
        self.storage.lookup_handle(commitment)
    }

    /// Local lookup, then the external index.
    ///
    /// A handle found externally is checked against the commitment and
    /// remembered locally before it is returned.
    ///
    /// # Errors
    ///
    /// - `HandleNotFound`: neither source knows the commitment
    /// - `Integrity`: the external index returned a handle for another digest
    /// - `ContentStore`: the external index failed
    pub async fn resolve_or_fallback(&self, commitment: &Commitment) -> Result<String, Error> {
        if let Some(handle) = self.resolve(commitment)? {
            return Ok(handle);
        }

        let Some(fallback) = &self.fallback else {
            return Err(Error::HandleNotFound { commitment: commitment.to_hex() });
        };

        debug!(%commitment, "local commitment miss, consulting handle index");
        let Some(handle) = fallback.lookup(commitment).await? else {
            return Err(Error::HandleNotFound { commitment: commitment.to_hex() });
        };

        if commit(&handle) != *commitment {
            warn!(%commitment, handle = %handle, "handle index returned mismatched handle");
            return Err(Error::Integrity(format!(
                "handle index entry does not hash to {commitment}"
            )));
        }

        self.remember(commitment, &handle)?;
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::{error::ContentStoreError, storage::MemoryStorage};

    struct FixedIndex(Option<String>);

    #[async_trait]
    impl HandleIndex for FixedIndex {
        async fn lookup(&self, _: &Commitment) -> Result<Option<String>, ContentStoreError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn commit_is_deterministic_and_distinct() {
        assert_eq!(commit("bafyA"), commit("bafyA"));
        assert_ne!(commit("bafyA"), commit("bafyB"));
        assert_eq!(commit("").0, keccak256(b""));
    }

    #[test]
    fn remember_then_resolve() {
        let mapper = CommitmentMapper::new(MemoryStorage::new(), None);
        let commitment = mapper.commit_and_remember("bafyA").unwrap();

        assert_eq!(mapper.resolve(&commitment).unwrap().as_deref(), Some("bafyA"));
        assert_eq!(mapper.resolve(&commit("other")).unwrap(), None);
    }

    #[tokio::test]
    async fn miss_without_fallback_is_handle_not_found() {
        let mapper = CommitmentMapper::new(MemoryStorage::new(), None);
        let result = mapper.resolve_or_fallback(&commit("bafyA")).await;
        assert!(matches!(result, Err(Error::HandleNotFound { .. })));
    }

    #[tokio::test]
    async fn fallback_hit_is_remembered() {
        let storage = MemoryStorage::new();
        let index: Arc<dyn HandleIndex> = Arc::new(FixedIndex(Some("bafyA".to_string())));
        let mapper = CommitmentMapper::new(storage.clone(), Some(index));

        let handle = mapper.resolve_or_fallback(&commit("bafyA")).await.unwrap();
        assert_eq!(handle, "bafyA");
        assert_eq!(storage.lookup_handle(&commit("bafyA")).unwrap().as_deref(), Some("bafyA"));
    }

    #[tokio::test]
    async fn fallback_miss_is_handle_not_found() {
        let index: Arc<dyn HandleIndex> = Arc::new(FixedIndex(None));
        let mapper = CommitmentMapper::new(MemoryStorage::new(), Some(index));
        let result = mapper.resolve_or_fallback(&commit("bafyA")).await;
        assert!(matches!(result, Err(Error::HandleNotFound { .. })));
    }

    #[tokio::test]
    async fn mismatched_fallback_handle_is_rejected() {
        let index: Arc<dyn HandleIndex> = Arc::new(FixedIndex(Some("bafyEvil".to_string())));
        let storage = MemoryStorage::new();
        let mapper = CommitmentMapper::new(storage.clone(), Some(index));

        let result = mapper.resolve_or_fallback(&commit("bafyA")).await;
        assert!(matches!(result, Err(Error::Integrity(_))));
        assert_eq!(storage.lookup_handle(&commit("bafyA")).unwrap(), None);
    }
}
