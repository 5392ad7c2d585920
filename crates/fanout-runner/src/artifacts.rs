//! Artifact discovery in a job's output folder.

use fanout_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Files under `root` whose name ends with one of `extensions`, sorted by
/// path. A missing `root` yields no artifacts.
pub fn discover_artifacts(root: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !root.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            Error::Io(std::io::Error::other(format!(
                "failed to scan {}: {e}",
                root.display()
            )))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            found.push(entry.into_path());
        }
    }

    found.sort();
    Ok(found)
}
