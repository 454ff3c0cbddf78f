//! Loads/merges the state store into a flat provides map, and applies
//! commits transactionally.
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{
    clears,
    clears::ClearsProvidesList,
    device_type,
    provides::{self, ProvidesMap, ARTIFACT_GROUP_KEY, ARTIFACT_NAME_KEY},
    store::{self, StateStore, Transaction},
};

const KEY_ARTIFACT_NAME: &[u8] = b"artifact-name";
const KEY_ARTIFACT_GROUP: &[u8] = b"artifact-group";
const KEY_ARTIFACT_PROVIDES: &[u8] = b"artifact-provides";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] store::Error),
    #[error(transparent)]
    Provides(#[from] provides::Error),
}

pub struct Context<S> {
    store: S,
    device_type_path: PathBuf,
}

fn bytes_to_string(bytes: Vec<u8>) -> String {
    // Store values are always written as UTF-8 by this crate; an invalid
    // sequence here means something outside this crate wrote the slot.
    String::from_utf8(bytes).expect("store value was not valid UTF-8")
}

impl<S: StateStore> Context<S> {
    pub fn new(store: S, device_type_path: impl Into<PathBuf>) -> Self {
        Self {
            store,
            device_type_path: device_type_path.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Merges the name/group/provides store slots into one flat map.
    pub fn load_provides(&self) -> Result<ProvidesMap, Error> {
        let mut provides = match self.store.read(KEY_ARTIFACT_PROVIDES)? {
            Some(raw) => provides::parse_provides_json(&raw)?,
            None => ProvidesMap::new(),
        };

        if let Some(name) = self.store.read(KEY_ARTIFACT_NAME)? {
            provides.insert(ARTIFACT_NAME_KEY.to_string(), bytes_to_string(name));
        }
        if let Some(group) = self.store.read(KEY_ARTIFACT_GROUP)? {
            provides.insert(ARTIFACT_GROUP_KEY.to_string(), bytes_to_string(group));
        }

        Ok(provides)
    }

    /// Reads and parses the device type file.
    pub fn get_device_type(&self) -> Result<String, device_type::Error> {
        device_type::read(&self.device_type_path)
    }

    pub fn device_type_path(&self) -> &Path {
        &self.device_type_path
    }

    /// Atomically applies clears-provides wildcards, then new provides, then
    /// the name/group slots, inside one transaction.
    ///
    /// Runs `user_txn_fn` as part of the same transaction that writes the
    /// provides/clears-provides/name/group slots; if it errors the whole
    /// batch (including the provides changes) is aborted.
    pub fn commit_artifact_data(
        &self,
        name: &str,
        group: &str,
        new_provides: Option<ProvidesMap>,
        clears_provides: Option<ClearsProvidesList>,
        user_txn_fn: &mut dyn FnMut(
            &mut dyn Transaction,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>,
    ) -> Result<(), Error> {
        self.store
            .write_transaction(&mut |txn| {
                let mut provides = match txn
                    .read(KEY_ARTIFACT_PROVIDES)
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                {
                    Some(raw) => provides::parse_provides_json(&raw)
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?,
                    None => ProvidesMap::new(),
                };

                let mut clears_group = false;
                if let Some(clears) = &clears_provides {
                    let before = provides.len();
                    clears_group = clears::apply(clears, &mut provides);
                    debug!(
                        cleared = before - provides.len(),
                        cleared_group = clears_group,
                        "applied clears-provides before writing new provides"
                    );
                }

                if let Some(new_provides) = new_provides {
                    provides.extend(new_provides);
                }

                if provides.is_empty() {
                    txn.remove(KEY_ARTIFACT_PROVIDES)
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                } else {
                    let serialized = provides::serialize_provides_json(&provides);
                    txn.write(KEY_ARTIFACT_PROVIDES, &serialized)
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                }

                txn.write(KEY_ARTIFACT_NAME, name.as_bytes())
                    .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;

                if group.is_empty() || clears_group {
                    txn.remove(KEY_ARTIFACT_GROUP)
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                }
                if !group.is_empty() {
                    txn.write(KEY_ARTIFACT_GROUP, group.as_bytes())
                        .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?;
                }

                user_txn_fn(txn)
            })
            .map_err(Error::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store_memory::InMemoryStore;
    use std::io::Write as _;

    fn device_type_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn ctx() -> Context<InMemoryStore> {
        let f = device_type_file("device_type=diamond\n");
        // Leak the tempfile path for the duration of the test; NamedTempFile
        // would delete the file on drop otherwise.
        let path = f.into_temp_path().keep().unwrap();
        Context::new(InMemoryStore::new(), path)
    }

    #[test]
    fn load_provides_merges_name_group_and_json() {
        let context = ctx();
        context.store().write(b"artifact-name", b"an").unwrap();
        context.store().write(b"artifact-group", b"ag").unwrap();
        context
            .store()
            .write(b"artifact-provides", br#"{"x":"y"}"#)
            .unwrap();

        let provides = context.load_provides().unwrap();
        assert_eq!(provides.get("artifact_name"), Some(&"an".to_string()));
        assert_eq!(provides.get("artifact_group"), Some(&"ag".to_string()));
        assert_eq!(provides.get("x"), Some(&"y".to_string()));
    }

    #[test]
    fn load_provides_tolerates_missing_slots() {
        let context = ctx();
        let provides = context.load_provides().unwrap();
        assert!(provides.is_empty());
    }

    #[test]
    fn commit_with_clears_removes_then_applies_new() {
        let context = ctx();
        context
            .store()
            .write(b"artifact-provides", br#"{"a":"1","b":"2","c":"3"}"#)
            .unwrap();

        let mut new_provides = ProvidesMap::new();
        new_provides.insert("d".into(), "4".into());

        context
            .commit_artifact_data(
                "artifact2",
                "group2",
                Some(new_provides),
                Some(vec!["a".into(), "c".into()]),
                &mut |_| Ok(()),
            )
            .unwrap();

        let provides = context.load_provides().unwrap();
        assert_eq!(provides.get("d"), Some(&"4".to_string()));
        assert_eq!(provides.get("b"), Some(&"2".to_string()));
        assert!(!provides.contains_key("a"));
        assert!(!provides.contains_key("c"));
        assert_eq!(provides.get("artifact_name"), Some(&"artifact2".to_string()));
        assert_eq!(provides.get("artifact_group"), Some(&"group2".to_string()));
    }

    #[test]
    fn commit_with_empty_group_removes_group_slot() {
        let context = ctx();
        context.store().write(b"artifact-group", b"stale").unwrap();

        context
            .commit_artifact_data("artifact1", "", None, None, &mut |_| Ok(()))
            .unwrap();

        let provides = context.load_provides().unwrap();
        assert!(!provides.contains_key("artifact_group"));
        assert_eq!(provides.get("artifact_name"), Some(&"artifact1".to_string()));
    }

    #[test]
    fn legacy_artifact_skips_provides_handling() {
        let context = ctx();
        context
            .store()
            .write(b"artifact-provides", br#"{"a":"1"}"#)
            .unwrap();

        context
            .commit_artifact_data("legacy", "legacy-group", None, None, &mut |_| Ok(()))
            .unwrap();

        let provides = context.load_provides().unwrap();
        // Existing provides untouched because no clears/provides were given.
        assert_eq!(provides.get("a"), Some(&"1".to_string()));
        assert_eq!(provides.get("artifact_name"), Some(&"legacy".to_string()));
    }

    #[test]
    fn user_txn_failure_aborts_whole_commit() {
        let context = ctx();
        context.store().write(b"artifact-name", b"before").unwrap();

        let result = context.commit_artifact_data(
            "after",
            "group",
            None,
            None,
            &mut |_| Err("user hook failed".into()),
        );
        assert!(result.is_err());

        let provides = context.load_provides().unwrap();
        assert_eq!(provides.get("artifact_name"), Some(&"before".to_string()));
    }

    #[test]
    fn get_device_type_reads_file() {
        let context = ctx();
        assert_eq!(context.get_device_type().unwrap(), "diamond");
    }
}
