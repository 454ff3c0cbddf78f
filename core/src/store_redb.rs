//! `redb`-backed implementation of [`StateStore`]. `redb` is a pure-Rust,
//! ACID, single-file embedded database with the same transactional shape as
//! an LMDB binding: one writer at a time, `begin_write`/`commit`, snapshot
//! reads. Using it keeps this crate dependency-free of `unsafe` FFI.
use std::{
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use redb::{Database, ReadableTable, TableDefinition};
use tracing::warn;

use crate::store::{ClosedStoreError, Error, StateStore, Transaction};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("device-context");

pub struct RedbStore {
    db: Database,
    closed: AtomicBool,
}

impl RedbStore {
    /// Opens (or creates) a store at `path`. Parent directories are created
    /// automatically, the way `RedbStore::open` does in `nclav-store`.
    pub fn open(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::backend)?;
        }
        let db = Database::create(path).map_err(Error::backend)?;
        {
            let wtxn = db.begin_write().map_err(Error::backend)?;
            wtxn.open_table(TABLE).map_err(Error::backend)?;
            wtxn.commit().map_err(Error::backend)?;
        }
        Ok(Self {
            db,
            closed: AtomicBool::new(false),
        })
    }

    /// Marks the store closed. Any further call into [`StateStore`] panics
    /// with [`ClosedStoreError`]: use of a closed store is a programming
    /// error, not a recoverable runtime condition.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn assert_open(&self) {
        if self.closed.load(Ordering::SeqCst) {
            warn!("state store used after close");
            panic!("{}", ClosedStoreError);
        }
    }
}

struct RedbTransaction {
    txn: redb::WriteTransaction,
}

impl Transaction for RedbTransaction {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        let mut table = self.txn.open_table(TABLE).map_err(Error::backend)?;
        table.insert(key, value).map_err(Error::backend)?;
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), Error> {
        let mut table = self.txn.open_table(TABLE).map_err(Error::backend)?;
        table.remove(key).map_err(Error::backend)?;
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        let table = self.txn.open_table(TABLE).map_err(Error::backend)?;
        Ok(table
            .get(key)
            .map_err(Error::backend)?
            .map(|guard| guard.value().to_vec()))
    }
}

impl StateStore for RedbStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.assert_open();
        let rtxn = self.db.begin_read().map_err(Error::backend)?;
        let table = rtxn.open_table(TABLE).map_err(Error::backend)?;
        Ok(table
            .get(key)
            .map_err(Error::backend)?
            .map(|guard| guard.value().to_vec()))
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.assert_open();
        let wtxn = self.db.begin_write().map_err(Error::backend)?;
        {
            let mut table = wtxn.open_table(TABLE).map_err(Error::backend)?;
            table.insert(key, value).map_err(Error::backend)?;
        }
        wtxn.commit().map_err(Error::backend)?;
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), Error> {
        self.assert_open();
        let wtxn = self.db.begin_write().map_err(Error::backend)?;
        {
            let mut table = wtxn.open_table(TABLE).map_err(Error::backend)?;
            table.remove(key).map_err(Error::backend)?;
        }
        wtxn.commit().map_err(Error::backend)?;
        Ok(())
    }

    fn write_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    ) -> Result<(), Error> {
        self.assert_open();
        let wtxn = self.db.begin_write().map_err(Error::backend)?;
        let mut txn = RedbTransaction { txn: wtxn };
        f(&mut txn).map_err(Error::Commit)?;
        txn.txn.commit().map_err(Error::backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store(dir: &TempDir) -> RedbStore {
        RedbStore::open(&dir.path().join("state.redb")).unwrap()
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.write(b"artifact-name", b"my-artifact").unwrap();
        assert_eq!(
            store.read(b"artifact-name").unwrap(),
            Some(b"my-artifact".to_vec())
        );
    }

    #[test]
    fn read_of_absent_key_is_none() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        assert_eq!(store.read(b"nope").unwrap(), None);
    }

    #[test]
    fn remove_clears_key() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.write(b"k", b"v").unwrap();
        store.remove(b"k").unwrap();
        assert_eq!(store.read(b"k").unwrap(), None);
    }

    #[test]
    fn transaction_aborts_on_error() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.write(b"k", b"before").unwrap();

        let result = store.write_transaction(&mut |txn| {
            txn.write(b"k", b"after").unwrap();
            Err("boom".into())
        });
        assert!(result.is_err());
        assert_eq!(store.read(b"k").unwrap(), Some(b"before".to_vec()));
    }

    #[test]
    fn transaction_commits_on_success() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store
            .write_transaction(&mut |txn| {
                txn.write(b"a", b"1")?;
                txn.write(b"b", b"2")?;
                Ok(())
            })
            .unwrap();
        assert_eq!(store.read(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.read(b"b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    #[should_panic(expected = "state store used after being closed")]
    fn closed_store_panics() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);
        store.close();
        let _ = store.read(b"k");
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.write(b"k", b"v").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.read(b"k").unwrap(), Some(b"v".to_vec()));
    }
}
