//! Snapshot artifact and its metadata sidecar.
//!
//! Both files are replaced atomically: the new bytes go to a temporary file in
//! the same directory, are flushed to disk, and the temporary file is renamed
//! over the target. Readers see either the old or the new version.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::models::{Snapshot, SnapshotMeta};

/// Read the snapshot and its metadata. Missing files read as empty.
pub fn read_snapshot(snapshot_path: &Path, meta_path: &Path) -> Result<Snapshot> {
    let content = match fs::read_to_string(snapshot_path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::io(snapshot_path, e)),
    };
    Ok(Snapshot {
        content,
        meta: read_meta(meta_path)?,
    })
}

pub fn read_meta(meta_path: &Path) -> Result<SnapshotMeta> {
    match fs::read(meta_path) {
        Ok(raw) => Ok(serde_json::from_slice(&raw)?),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(SnapshotMeta::default()),
        Err(e) => Err(Error::io(meta_path, e)),
    }
}

pub fn write_meta(meta_path: &Path, meta: &SnapshotMeta) -> Result<()> {
    let json = serde_json::to_vec_pretty(meta)?;
    write_atomic(meta_path, &json)
}

/// Replace `path` with `bytes` in a single rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
    tmp.write_all(bytes).map_err(|e| Error::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| Error::io(tmp.path(), e))?;
    tmp.persist(path).map_err(|e| Error::io(path, e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote file atomically");
    Ok(())
}
