//! In-memory [`StateStore`] used by tests that exercise [`crate::context`]
//! without needing a real database file, mirroring the `InMemoryStore` /
//! `RedbStore` split used for the sibling state-store crate this design is
//! drawn from.
use std::{
    collections::BTreeMap,
    sync::{Mutex, RwLock},
};

use crate::store::{Error, StateStore, Transaction};

#[derive(Default)]
pub struct InMemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
    closed: Mutex<bool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    fn assert_open(&self) {
        if *self.closed.lock().unwrap() {
            panic!("{}", super::store::ClosedStoreError);
        }
    }
}

struct MemoryTransaction<'a> {
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    base: &'a RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl Transaction for MemoryTransaction<'_> {
    fn write(&mut self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.staged.insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn remove(&mut self, key: &[u8]) -> Result<(), Error> {
        self.staged.insert(key.to_vec(), None);
        Ok(())
    }

    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(staged.clone());
        }
        Ok(self.base.read().unwrap().get(key).cloned())
    }
}

impl StateStore for InMemoryStore {
    fn read(&self, key: &[u8]) -> Result<Option<Vec<u8>>, Error> {
        self.assert_open();
        Ok(self.data.read().unwrap().get(key).cloned())
    }

    fn write(&self, key: &[u8], value: &[u8]) -> Result<(), Error> {
        self.assert_open();
        self.data
            .write()
            .unwrap()
            .insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &[u8]) -> Result<(), Error> {
        self.assert_open();
        self.data.write().unwrap().remove(key);
        Ok(())
    }

    fn write_transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn Transaction) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    ) -> Result<(), Error> {
        self.assert_open();
        let mut txn = MemoryTransaction {
            staged: BTreeMap::new(),
            base: &self.data,
        };
        f(&mut txn).map_err(Error::Commit)?;

        let mut base = self.data.write().unwrap();
        for (key, value) in txn.staged {
            match value {
                Some(value) => {
                    base.insert(key, value);
                }
                None => {
                    base.remove(&key);
                }
            }
        }
        Ok(())
    }
}
