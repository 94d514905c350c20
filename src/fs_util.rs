use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::Builder;

use crate::error::PrepError;

pub fn ensure_dir(path: &Path) -> Result<(), PrepError> {
    fs::create_dir_all(path)
        .map_err(|err| PrepError::Filesystem(format!("create {}: {err}", path.display())))
}

pub fn ensure_parent(path: &Path) -> Result<(), PrepError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

/// Writes `content` to a temp file next to `path` and renames it into place,
/// so readers see either the old file or the complete new one.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<(), PrepError> {
    ensure_parent(path)?;
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = Builder::new()
        .prefix(".slideprep")
        .tempfile_in(parent)
        .map_err(|err| PrepError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| PrepError::Filesystem(err.to_string()))?;
    temp.persist(path)
        .map_err(|err| PrepError::Filesystem(format!("persist {}: {err}", path.display())))?;
    Ok(())
}
