//! The persistent KV store contract: a thin capability trait over whatever
//! embedded database engine backs it. [`crate::store_redb`] supplies the
//! real implementation, [`crate::store_memory`] a throwaway one for tests.
use std::fmt;

/// Raised when a fallible store operation fails for a reason the caller can
/// recover from (backend I/O, corruption, serialization).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("state store backend error")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("user transaction callback failed")]
    Commit(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn backend<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(e))
    }
}

/// Raised by any store method called after a concrete store's `close()`
/// (e.g. [`crate::store_redb::RedbStore::close`],
/// [`crate::store_memory::InMemoryStore::close`] — `close` is not part of
/// the [`StateStore`] trait itself, since nothing generic over `StateStore`
/// needs to call it). Unlike [`Error`], this is not meant to be handled:
/// using a closed store is a logic bug in the caller, not a runtime
/// condition, so implementations should let it panic rather than return a
/// recoverable error.
#[derive(Debug)]
pub struct ClosedStoreError;

impl fmt::Display for ClosedStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("state store used after being closed")
    }
}

impl std::error::Error for ClosedStoreError {}

/// A transaction handle. Writes made through it are only visible to other
/// readers once [`Transaction::commit`] is called; dropping it without
/// committing aborts the batch.
pub trait Transaction {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error>;
    fn remove(&mut self, key: &[u8]) -> Result<(), Error>;
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;
}

pub trait StateStore {
    /// Returns `Ok(None)` if `key` is absent.
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error>;

    /// Auto-commits a single write outside of an explicit transaction.
    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), Error>;

    /// Auto-commits a single removal outside of an explicit transaction.
    /// Removing an absent key is not an error.
    fn remove(&self, key: &[u8]) -> Result<(), Error>;

    /// Runs `f` with a transaction handle. If `f` returns `Ok`, the batch is
    /// committed atomically; any `Err` aborts it and is propagated as
    /// [`Error::Commit`].
    fn write_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    ) -> Result<(), Error>;
}
