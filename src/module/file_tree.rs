//! Materializes the directory of input files an update module reads as it
//! runs.
use std::{fs, io, path::Path};

use update_client_core::{artifact::ArtifactHeader, context::Context, store::StateStore};

#[derive(Debug, thiserror::Error)]
#[error("failed writing update-module file tree at `{}`", .0.display())]
pub struct Error(std::path::PathBuf, #[source] io::Error);

fn write(path: &Path, contents: &[u8]) -> Result<(), Error> {
    fs::write(path, contents).map_err(|e| Error(path.to_path_buf(), e))
}

/// Writes `version`, `current_*`, and `header/*` into `path`, overwriting
/// whatever was there from a previous run.
pub fn prepare_file_tree<S: StateStore>(
    path: &Path,
    context: &Context<S>,
    header: &impl ArtifactHeader,
) -> Result<(), Error> {
    fs::create_dir_all(path).map_err(|e| Error(path.to_path_buf(), e))?;
    let header_dir = path.join("header");
    fs::create_dir_all(&header_dir).map_err(|e| Error(header_dir.clone(), e))?;

    write(&path.join("version"), b"3\n")?;

    let provides = context
        .load_provides()
        .unwrap_or_default();
    let current_artifact_name = provides
        .get(update_client_core::provides::ARTIFACT_NAME_KEY)
        .cloned()
        .unwrap_or_default();
    let current_artifact_group = provides
        .get(update_client_core::provides::ARTIFACT_GROUP_KEY)
        .cloned()
        .unwrap_or_default();
    write(
        &path.join("current_artifact_name"),
        format!("{current_artifact_name}\n").as_bytes(),
    )?;
    write(
        &path.join("current_artifact_group"),
        format!("{current_artifact_group}\n").as_bytes(),
    )?;

    let device_type = context
        .get_device_type()
        .map_err(|e| Error(context.device_type_path().to_path_buf(), io::Error::new(io::ErrorKind::Other, e)))?;
    write(
        &path.join("current_device_type"),
        format!("{device_type}\n").as_bytes(),
    )?;

    write(&header_dir.join("artifact_name"), header.artifact_name().as_bytes())?;
    write(&header_dir.join("artifact_group"), header.artifact_group().as_bytes())?;
    write(&header_dir.join("payload_type"), header.payload_type().as_bytes())?;
    write(
        &header_dir.join("header_info"),
        &serde_json::to_vec(header.header_info()).unwrap_or_default(),
    )?;
    write(
        &header_dir.join("type_info"),
        &serde_json::to_vec(header.type_info()).unwrap_or_default(),
    )?;
    write(
        &header_dir.join("meta_data"),
        &serde_json::to_vec(header.meta_data()).unwrap_or_default(),
    )?;

    Ok(())
}

/// Idempotent recursive removal of a previously materialized file tree.
pub fn delete_file_tree(path: &Path) -> Result<(), Error> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error(path.to_path_buf(), e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;
    use update_client_core::{artifact::testing::StaticHeader, store_memory::InMemoryStore};

    fn context_with(name: &str, group: &str) -> Context<InMemoryStore> {
        let device_type_file = tempfile::NamedTempFile::new().unwrap();
        stdfs::write(device_type_file.path(), "device_type=diamond\n").unwrap();
        let path = device_type_file.into_temp_path().keep().unwrap();

        let store = InMemoryStore::new();
        store.write(b"artifact-name", name.as_bytes()).unwrap();
        if !group.is_empty() {
            store.write(b"artifact-group", group.as_bytes()).unwrap();
        }
        Context::new(store, path)
    }

    #[test]
    fn materializes_expected_files() {
        let context = context_with("previous-artifact", "previous-group");
        let header = StaticHeader {
            artifact_name: "new-artifact".into(),
            artifact_group: "new-group".into(),
            payload_type: "rootfs-image".into(),
            header_info: serde_json::json!({"a": 1}),
            type_info: serde_json::json!({"b": 2}),
            meta_data: serde_json::json!({"c": 3}),
        };

        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        prepare_file_tree(&tree, &context, &header).unwrap();

        assert_eq!(stdfs::read_to_string(tree.join("version")).unwrap(), "3\n");
        assert_eq!(
            stdfs::read_to_string(tree.join("current_artifact_name")).unwrap(),
            "previous-artifact\n"
        );
        assert_eq!(
            stdfs::read_to_string(tree.join("current_artifact_group")).unwrap(),
            "previous-group\n"
        );
        assert_eq!(
            stdfs::read_to_string(tree.join("current_device_type")).unwrap(),
            "diamond\n"
        );
        assert_eq!(
            stdfs::read_to_string(tree.join("header").join("artifact_name")).unwrap(),
            "new-artifact"
        );
        assert_eq!(
            stdfs::read_to_string(tree.join("header").join("payload_type")).unwrap(),
            "rootfs-image"
        );
        assert_eq!(
            stdfs::read_to_string(tree.join("header").join("header_info")).unwrap(),
            r#"{"a":1}"#
        );
    }

    #[test]
    fn delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("nonexistent");
        delete_file_tree(&tree).unwrap();
        delete_file_tree(&tree).unwrap();
    }
}
