//! Filesystem helpers shared by the file mutator and the version store.

use std::io::Write;

use camino::Utf8Path;
use tempfile::NamedTempFile;

/// Replace `path` with `contents` without ever exposing a partial file.
///
/// The data goes to a temporary file in the same directory, is synced, and
/// is then renamed over the target. Permissions of an existing target are
/// carried over.
pub(crate) fn write_atomic(path: &Utf8Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_str().is_empty() => parent,
        _ => Utf8Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file().set_permissions(meta.permissions())?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
