//! The flat key-value map describing "what the device currently is."
use std::collections::BTreeMap;

use serde_json::Value;

/// Mapping *name → value*, both non-empty UTF-8 strings. Keys are unique;
/// insertion order carries no meaning, so this is backed by a `BTreeMap` to
/// get deterministic iteration (and JSON serialization) for free instead of
/// leaving ordering to whatever a hash map happens to do.
pub type ProvidesMap = BTreeMap<String, String>;

pub const ARTIFACT_NAME_KEY: &str = "artifact_name";
pub const ARTIFACT_GROUP_KEY: &str = "artifact_group";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("artifact-provides value for key `{0}` was not a string")]
    TypeError(String),
    #[error("failed parsing artifact-provides as a json object")]
    ParseError(#[source] serde_json::Error),
    #[error("artifact-provides value was valid json but not an object")]
    NotAnObject,
}

/// Parses the raw `artifact-provides` store value (a JSON object whose
/// values must all be strings) into a [`ProvidesMap`].
pub fn parse_provides_json(raw: &[u8]) -> Result<ProvidesMap, Error> {
    let value: Value = serde_json::from_slice(raw).map_err(Error::ParseError)?;
    let Value::Object(map) = value else {
        return Err(Error::NotAnObject);
    };

    let mut provides = ProvidesMap::new();
    for (key, value) in map {
        match value {
            Value::String(s) => {
                provides.insert(key, s);
            }
            _ => return Err(Error::TypeError(key)),
        }
    }
    Ok(provides)
}

/// Serializes a [`ProvidesMap`] back to the JSON object form stored under
/// `artifact-provides`. Keys are sorted (the map is already a `BTreeMap`),
/// which keeps the on-disk representation deterministic; spec only requires
/// set equality of the decoded result, not byte-for-byte stability, but
/// determinism makes tests and diffs saner.
pub fn serialize_provides_json(provides: &ProvidesMap) -> Vec<u8> {
    serde_json::to_vec(provides).expect("ProvidesMap serializes infallibly")
}
