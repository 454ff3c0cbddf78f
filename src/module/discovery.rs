//! Enumerates executable update modules under `<data_store_dir>/modules/v3/`.
use std::{
    fs, io,
    os::unix::fs::PermissionsExt as _,
    path::{Path, PathBuf},
};

#[derive(Debug, thiserror::Error)]
#[error("failed reading module directory at `{}`", .0.display())]
pub struct Error(pub PathBuf, #[source] pub io::Error);

const EXECUTE_BITS: u32 = 0o111;

/// Lists executable regular files directly under `<data_store_dir>/modules/v3/`.
/// A missing directory is not an error: it means no modules are installed.
pub fn discover_modules(data_store_dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let modules_dir = data_store_dir.join("modules").join("v3");

    let entries = match fs::read_dir(&modules_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error(modules_dir, e)),
    };

    let mut modules = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error(modules_dir.clone(), e))?;
        let metadata = entry
            .metadata()
            .map_err(|e| Error(modules_dir.clone(), e))?;
        if metadata.is_file() && metadata.permissions().mode() & EXECUTE_BITS != 0 {
            modules.push(entry.path());
        }
    }
    modules.sort();
    Ok(modules)
}
