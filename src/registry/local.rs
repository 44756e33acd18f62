use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::CheckError;
use crate::Result;

pub const MANIFEST_FILE: &str = "package.json";

/// Monorepo sub-packages live one level below this directory.
pub const PACKAGES_DIR: &str = "packages";

/// Resolve a `file:`/relative dependency spec against the declaring
/// manifest's directory.
pub fn resolve_file_spec(base_dir: &Path, spec: &str) -> PathBuf {
    let path = Path::new(spec.strip_prefix("file:").unwrap_or(spec));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Read and parse `<dir>/package.json`.
pub fn read_package_dir(dir: &Path) -> Result<Value> {
    read_manifest_file(&dir.join(MANIFEST_FILE))
}

/// Read and parse a manifest file.
pub fn read_manifest_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|source| CheckError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| CheckError::ParseJson {
        path: path.display().to_string(),
        source,
    })
}

/// List the manifest files of a directory: the top-level `package.json`
/// first, then `packages/<name>/package.json` in name order.
pub fn discover_manifests(root: &Path) -> Result<Vec<PathBuf>> {
    let mut manifests = Vec::new();

    let top = root.join(MANIFEST_FILE);
    if top.is_file() {
        manifests.push(top);
    }

    let packages = root.join(PACKAGES_DIR);
    if !packages.is_dir() {
        return Ok(manifests);
    }

    let entries = std::fs::read_dir(&packages).map_err(|source| CheckError::Io {
        path: packages.clone(),
        source,
    })?;

    let mut sub_dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    sub_dirs.sort();

    manifests.extend(
        sub_dirs
            .into_iter()
            .map(|dir| dir.join(MANIFEST_FILE))
            .filter(|manifest| manifest.is_file()),
    );

    Ok(manifests)
}
